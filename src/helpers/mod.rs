//! Low-level readers for the xlsx package: file/memory source, zip container, XML parts
pub(crate) mod reader;
pub(crate) mod xml;
pub(crate) mod zip;
