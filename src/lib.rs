// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # dotvtable
//!
//! A reader for ECMA-335 (CLI) metadata and a builder for the virtual dispatch tables of
//! the types it describes, intended for hosts that load managed code themselves.
//!
//! Images are loaded from a PE file or a bare metadata blob. The [`metadata::typesystem`]
//! resolves tokens across images into hash-consed [`metadata::typesystem::TypeId`]s, with
//! types the images do not define (usually the core library) supplied by a
//! [`metadata::typesystem::RuntimeHost`]. The [`vtable::VTableBuilder`] then lays out the
//! virtual slots of any class or interface: inherited slots first, overrides in place,
//! interface blocks appended, explicit `MethodImpl` records honoured, generic
//! instantiations sharing the shape of their definition.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotvtable::prelude::*;
//!
//! let system = TypeSystem::new(Arc::new(NullHost), LoadConfig::default());
//! let module = system.add_image(Image::load(std::fs::read("Hello.dll")?)?)?;
//!
//! let vtables = VTableBuilder::new(Arc::new(system));
//! if let Some(hello) = vtables.system().find_type("Demo", "Hello")? {
//!     let ty = vtables.system().self_type(hello)?;
//!     for slot in &vtables.tree_of(ty)?.method_impls {
//!         println!("{:3} {}", slot.slot, slot.name);
//!     }
//! }
//! # let _ = module;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - PE or bare container detection, RVA mapping, the byte cursor and the
//!   compressed integer codec
//! - [`metadata`] - metadata root, heaps, tables, signatures, method bodies and the type
//!   system
//! - [`vtable`] - virtual table construction and dispatch queries
//! - [`Error`] and [`Result`] - error handling shared by every module
//!
//! Nothing here installs a `tracing` subscriber; loading and layout decisions are reported
//! at `debug` and `trace` level for the embedding application to collect.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Limits and validation switches applied while loading.
pub mod config;

/// Input containers and low-level byte access.
pub mod file;

/// Definitions, parsing and resolution of CLI metadata based on ECMA-335.
///
/// # Examples
///
/// ```rust,no_run
/// use dotvtable::metadata::{image::Image, tables::TypeDefRaw};
///
/// let image = Image::load(std::fs::read("Hello.dll")?)?;
/// if let Some(types) = image.table::<TypeDefRaw>() {
///     println!("{} type definitions", types.row_count());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod metadata;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// Virtual dispatch tables.
pub mod vtable;

/// `dotvtable` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotvtable` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use dotvtable::{metadata::image::Image, Error};
///
/// match Image::load(std::fs::read("crafted.exe")?) {
///     Ok(image) => println!("{}", image.root().version),
///     Err(Error::BadImage { message, .. }) => println!("malformed: {message}"),
///     Err(error) => println!("{error}"),
/// }
/// # Ok::<(), std::io::Error>(())
/// ```
pub use error::Error;

pub use config::LoadConfig;
pub use metadata::image::Image;
pub use vtable::VTableBuilder;
