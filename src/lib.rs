//! Build, edit, and re-emit JVM class files
//!
//! A typical round trip parses a class with [`jvm::class_file::ClassFile::from_bytes`], wraps it
//! in a [`jvm::model::ClassBuilder`], edits methods through [`jvm::model::MethodBuilder`], and
//! serializes the result of [`jvm::model::ClassBuilder::build`].

pub mod jvm;
pub mod util;
