//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fl_cookies::{Expires, SameSite, WriteOptions};

/// Read and write cookies in a host cookie jar.
///
/// The jar is kept in a JSON file and bound to a document URL, which decides
/// the host, path, and security context cookies are written from.
#[derive(Parser, Debug)]
#[command(name = "fl-cookies")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Jar file to read and update
    #[arg(long, global = true)]
    pub jar: Option<PathBuf>,

    /// Document URL the jar is bound to
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value stored under a key (exit code 1 when absent)
    Get {
        /// Cookie key
        key: String,
    },
    /// Store a value under a key
    Put(PutArgs),
    /// Remove a key from the given scope
    Remove {
        /// Cookie key
        key: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Print the cookie domain derived from a hostname
    Domain {
        /// Hostname, e.g. www.freelancer.com
        host: String,
    },
    /// Print the raw cookie string visible to the document
    Dump,
}

#[derive(Args)]
pub struct PutArgs {
    /// Cookie key
    pub key: String,

    /// Cookie value
    pub value: String,

    #[command(flatten)]
    pub expiry: ExpiryArgs,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Restrict the cookie to secure transport
    #[arg(long, conflicts_with = "insecure")]
    pub secure: bool,

    /// Do not mark the cookie secure, even if the config says so
    #[arg(long)]
    pub insecure: bool,

    /// Cross-site sharing policy (Lax, Strict or None)
    #[arg(long)]
    pub same_site: Option<SameSite>,
}

#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct ExpiryArgs {
    /// Expire this many seconds from now (negative values are in the past)
    #[arg(long, allow_hyphen_values = true)]
    pub expires_in: Option<i64>,

    /// Expire at this HTTP-date, passed through verbatim
    #[arg(long)]
    pub expires_at: Option<String>,

    /// Never expire
    #[arg(long)]
    pub never_expire: bool,
}

impl ExpiryArgs {
    /// Returns the requested expiry, or `None` for a session cookie.
    #[must_use]
    pub fn expires(&self) -> Option<Expires> {
        if self.never_expire {
            Some(Expires::Never)
        } else if let Some(seconds) = self.expires_in {
            Some(Expires::InSeconds(seconds))
        } else {
            self.expires_at.clone().map(Expires::Literal)
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ScopeArgs {
    /// Explicit cookie domain
    #[arg(long, conflicts_with = "shared")]
    pub domain: Option<String>,

    /// Use the domain derived from the document host, shared across subdomains
    #[arg(long)]
    pub shared: bool,

    /// Cookie path (defaults to /)
    #[arg(long)]
    pub path: Option<String>,
}

impl ScopeArgs {
    /// Builds scope-only write options.
    ///
    /// `derived_domain` is used when `--shared` was given.
    #[must_use]
    pub fn write_options(&self, derived_domain: impl FnOnce() -> String) -> WriteOptions {
        let mut options = WriteOptions::new();
        if self.shared {
            options.domain = Some(derived_domain());
        } else {
            options.domain.clone_from(&self.domain);
        }
        options.path.clone_from(&self.path);
        options
    }
}

// Values may be credentials, so they stay out of debug logs.
impl fmt::Debug for PutArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutArgs")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .field("secure", &self.secure)
            .field("insecure", &self.insecure)
            .field("same_site", &self.same_site)
            .finish()
    }
}

impl PutArgs {
    /// Builds full write options, falling back to config defaults for
    /// `secure` and `same_site`.
    #[must_use]
    pub fn write_options(
        &self,
        default_secure: bool,
        default_same_site: Option<SameSite>,
        derived_domain: impl FnOnce() -> String,
    ) -> WriteOptions {
        let mut options = self.scope.write_options(derived_domain);
        options.expires = self.expiry.expires();
        options.secure = !self.insecure && (self.secure || default_secure);
        options.same_site = self.same_site.or(default_same_site);
        options
    }
}
