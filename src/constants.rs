//! # Application-Wide Constants
//!
//! Default tool locations, store keys, and limits used throughout macad.
//! Everything here can be overridden through [`crate::config::Settings`];
//! these values are only the starting point.

// ============================================================================
// Tool Locations
// ============================================================================

/// Reports the Active Directory binding (`dsconfigad -show`)
pub const DSCONFIGAD_PATH: &str = "/usr/sbin/dsconfigad";

/// Directory attribute queries (`dscl /Search -read /Users/<user> <attr>`)
pub const DSCL_PATH: &str = "/usr/bin/dscl";

/// Dynamic store reader, fed `show <key>` on stdin
pub const SCUTIL_PATH: &str = "/usr/sbin/scutil";

/// SRV record lookups for reachability checks
pub const DIG_PATH: &str = "/usr/bin/dig";

/// Ticket cache listing
pub const KLIST_PATH: &str = "/usr/bin/klist";

/// Ticket acquisition and renewal
pub const KINIT_PATH: &str = "/usr/bin/kinit";

/// Keychain access
pub const SECURITY_PATH: &str = "/usr/bin/security";

/// Directory search for group membership (SASL bind with the current ticket)
pub const LDAPSEARCH_PATH: &str = "/usr/bin/ldapsearch";

// ============================================================================
// Timeouts
// ============================================================================

/// Upper bound for any single external tool invocation
///
/// **Rationale**: directory, DNS and LDAP lookups are network bound and
/// can hang indefinitely when a domain controller is unreachable. 30 seconds
/// covers slow sites over VPN while still letting the caller fall back.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// A valid ticket expiring within this window is reported as expiring
pub const DEFAULT_RENEWAL_WINDOW_MINS: u64 = 30;

// ============================================================================
// Kerberos & Keychain
// ============================================================================

/// Lifetime requested from kinit
pub const DEFAULT_TICKET_LIFETIME: &str = "10h";

/// Keychain creator code kinit looks for when reading stored passwords
pub const KEYCHAIN_SERVICE_LABEL: &str = "aapl";

/// Text the ticket tool prints on a wrong password
pub const INCORRECT_PASSWORD_MARKER: &str = "incorrect";

/// `security` exit status for "The specified item could not be found"
pub const SECURITY_ITEM_NOT_FOUND: i32 = 44;

// ============================================================================
// Directory Service
// ============================================================================

/// Marker in `dsconfigad -show` output when the host is bound
pub const ACTIVE_DIRECTORY_MARKER: &str = "Active Directory";

/// Node searched for user records
pub const SEARCH_NODE: &str = "/Search";

/// Dynamic store key holding the Active Directory plugin state
pub const STORE_KEY_ACTIVE_DIRECTORY: &str = "com.apple.opendirectoryd.ActiveDirectory";

/// Dynamic store key holding the ordered search policy
pub const STORE_KEY_SEARCH_NODES: &str = "com.apple.opendirectoryd.node:/Search";

/// Dynamic store key holding the default Kerberos realms
pub const STORE_KEY_DEFAULT_REALMS: &str = "Kerberos-Default-Realms";

/// Dynamic store key holding the console user session
pub const STORE_KEY_CONSOLE_USER: &str = "State:/Users/ConsoleUser";

/// Console "user" reported while nobody is logged in
pub const LOGIN_WINDOW_USER: &str = "loginwindow";

// ============================================================================
// Environment & Logging
// ============================================================================

/// Filter directive for the log subscriber (e.g. `debug`, `macad=trace`)
pub const ENV_LOG: &str = "MACAD_LOG";

/// Set to `1` to also write logs to a file
pub const ENV_LOG_FILE: &str = "MACAD_LOG_FILE";

/// Overrides [`DEFAULT_COMMAND_TIMEOUT_SECS`]
pub const ENV_TIMEOUT_SECS: &str = "MACAD_TIMEOUT_SECS";

/// Overrides [`DEFAULT_TICKET_LIFETIME`]
pub const ENV_TICKET_LIFETIME: &str = "MACAD_TICKET_LIFETIME";

/// Keychain file to use instead of the user's default keychain
pub const ENV_KEYCHAIN: &str = "MACAD_KEYCHAIN";

/// Log files are rotated once they exceed this size
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
