//! Fixtures shared by the unit tests: image writers and a stub runtime host.


pub use builder::{MetadataBuilder, TablesBuilder};
pub use host::StubHost;

/// `MethodAttributes` combinations used by the layout tests.
pub mod method_flags {
    /// `public virtual abstract newslot hidebysig`
    pub const ABSTRACT: u16 = 0x05C6;
    /// `public final virtual newslot hidebysig`, an implicit interface implementation
    pub const IMPLEMENTATION: u16 = 0x01E6;
    /// `public virtual newslot hidebysig`
    pub const NEW_VIRTUAL: u16 = 0x01C6;
    /// `public virtual hidebysig`
    pub const OVERRIDE: u16 = 0x00C6;
    /// `private final virtual newslot hidebysig`, an explicit interface implementation
    pub const EXPLICIT: u16 = 0x01E1;
}

/// `TypeAttributes` combinations used by the layout tests.
pub mod type_flags {
    /// `public interface abstract`
    pub const INTERFACE: u32 = 0x0000_00A1;
    /// `public beforefieldinit`
    pub const CLASS: u32 = 0x0010_0001;
}
