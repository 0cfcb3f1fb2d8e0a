// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types for register storage and serialization.

use std::fmt;

/// ErrorKind is all kinds of Error of datasketches-hll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The config for the sketch is invalid.
    ConfigInvalid,
    /// An argument is outside the range the sketch accepts.
    InvalidArgument,
    /// A region to wrap was absent (empty).
    NullInput,
    /// A region is smaller than the layout it must hold.
    InsufficientSize,
    /// A mutating call was made on a read-only view.
    WriteAccess,
    /// A slot marked as escaped has no exception entry.
    InternalConsistency,
    /// The sketch data deserializing is malformed.
    MalformedDeserializeData,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NullInput => "NullInput",
            ErrorKind::InsufficientSize => "InsufficientSize",
            ErrorKind::WriteAccess => "WriteAccess",
            ErrorKind::InternalConsistency => "InternalConsistency",
            ErrorKind::MalformedDeserializeData => "MalformedDeserializeData",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all datasketches-hll functions.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::error::Error as _;
    /// use datasketches_hll::error::{Error, ErrorKind};
    ///
    /// let mut error = Error::new(ErrorKind::MalformedDeserializeData, "failed to read exceptions");
    /// assert!(error.source().is_none());
    /// error = error.set_source(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    /// assert!(error.source().is_some());
    /// ```
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

// Constructors for the failures the storage engine reports.
impl Error {
    pub(crate) fn null_input(what: &'static str) -> Self {
        Self::new(ErrorKind::NullInput, format!("{what} is empty"))
    }

    pub(crate) fn insufficient_size(what: &'static str, required: usize, actual: usize) -> Self {
        Self::new(
            ErrorKind::InsufficientSize,
            format!("{what} too small: required {required} bytes, got {actual}"),
        )
        .with_context("required", required)
        .with_context("actual", actual)
    }

    pub(crate) fn write_access() -> Self {
        Self::new(
            ErrorKind::WriteAccess,
            "cannot modify a sketch wrapped over read-only memory",
        )
    }

    pub(crate) fn missing_exception(slot: u32) -> Self {
        Self::new(
            ErrorKind::InternalConsistency,
            "slot holds the aux token but has no exception entry",
        )
        .with_context("slot", slot)
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub(crate) fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub(crate) fn deserial(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDeserializeData, message)
    }
}

impl Error {
    fn write_context(&self, f: &mut fmt::Formatter<'_>, sep: &str) -> fmt::Result {
        for (i, (key, value)) in self.context.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("context", &self.context)
                .field("source", &self.source)
                .finish();
        }

        match self.message.is_empty() {
            true => writeln!(f, "{}", self.kind)?,
            false => writeln!(f, "{} => {}", self.kind, self.message)?,
        }
        if !self.context.is_empty() {
            f.write_str("\nContext:\n   ")?;
            self.write_context(f, "\n   ")?;
            writeln!(f)?;
        }
        if let Some(source) = &self.source {
            writeln!(f, "\nSource:\n   {source:#}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.context.is_empty() {
            f.write_str(", context: { ")?;
            self.write_context(f, ", ")?;
            f.write_str(" }")?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|source| source.as_ref())
    }
}
