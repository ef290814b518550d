//! Host cookie jar capability and its adapters.
//!
//! A jar is modelled the way a browser exposes `document.cookie`: reading
//! yields every visible cookie as one `name=value; name=value` string, and
//! writing applies a single `Set-Cookie`-style assignment that the host merges
//! into its store by name and scope.

mod document;
mod memory;

pub use document::{DocumentCookieJar, DocumentUrlError};
pub use memory::{HostPolicy, JarFileError, MemoryCookieJar, StoredCookie};

/// The raw cookie jar supplied by the host environment.
pub trait CookieJar {
    /// Returns the full cookie string visible to the current document.
    fn read(&self) -> String;

    /// Applies one cookie assignment (`name=value;attr=...`).
    ///
    /// The host decides how to merge it: entries are replaced by name and
    /// scope, never by overwriting the whole jar. Rejected assignments are
    /// dropped silently.
    fn write(&mut self, assignment: &str);
}

impl<J: CookieJar + ?Sized> CookieJar for &mut J {
    fn read(&self) -> String {
        (**self).read()
    }

    fn write(&mut self, assignment: &str) {
        (**self).write(assignment);
    }
}

impl<J: CookieJar + ?Sized> CookieJar for Box<J> {
    fn read(&self) -> String {
        (**self).read()
    }

    fn write(&mut self, assignment: &str) {
        (**self).write(assignment);
    }
}
