//! Non-interactive places a token can be auto-detected from.
//!
//! Each source is independently fault-tolerant: unreadable or malformed
//! candidates are logged and skipped, never surfaced as errors.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::shapes::parse_credential_json;
use crate::core::models::usage::StoredToken;

/// Upper bound for any external credential-helper process.
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub const HELPER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// One auto-detection mechanism.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self) -> Option<StoredToken>;
}

/// Sources in cascade order for the current platform.
pub fn default_sources() -> Vec<Box<dyn CredentialSource>> {
    #[allow(unused_mut)]
    let mut sources: Vec<Box<dyn CredentialSource>> =
        vec![Box::new(FileSource::new(default_candidates()))];

    #[cfg(target_os = "windows")]
    sources.push(Box::new(windows::WindowsCredentialSource::new()));

    #[cfg(target_os = "macos")]
    sources.push(Box::new(macos::KeychainSource::new()));

    sources
}

/// Credential files written by Claude tooling, most likely first.
pub fn default_candidates() -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    let mut candidates = vec![
        home.join(".claude").join("credentials.json"),
        home.join(".claude").join("auth.json"),
        home.join(".claude").join(".credentials.json"),
        home.join(".config").join("claude").join("credentials.json"),
    ];
    for var in ["APPDATA", "LOCALAPPDATA"] {
        if let Some(dir) = std::env::var_os(var).filter(|v| !v.is_empty()) {
            candidates.push(PathBuf::from(dir).join("Claude").join("credentials.json"));
        }
    }
    candidates
}

/// Reads JSON credential blobs from a fixed list of paths.
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl CredentialSource for FileSource {
    fn name(&self) -> &str {
        "credential files"
    }

    async fn probe(&self) -> Option<StoredToken> {
        for path in &self.paths {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "No credential file");
                    continue;
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable credential file");
                    continue;
                }
            };
            match parse_credential_json(&content) {
                Some(token) => {
                    debug!(path = %path.display(), "Auto-detected credentials from file");
                    return Some(token);
                }
                None => debug!(path = %path.display(), "Skipping file with unrecognized layout"),
            }
        }
        None
    }
}

/// Prefix of the line that opens each blob in the credential-manager dump.
#[cfg(any(target_os = "windows", test))]
const BLOB_MARKER: &str = "##claudewatch-target ";

/// Pick the first blob in a `BLOB_MARKER`-delimited dump that matches a known
/// layout. Returns the target name it came from along with the token.
#[cfg(any(target_os = "windows", test))]
fn first_recognized_blob(output: &str) -> Option<(&str, StoredToken)> {
    let mut blobs: Vec<(&str, String)> = Vec::new();
    for line in output.lines() {
        if let Some(target) = line.strip_prefix(BLOB_MARKER) {
            blobs.push((target.trim(), String::new()));
        } else if let Some((_, blob)) = blobs.last_mut() {
            blob.push_str(line);
            blob.push('\n');
        }
    }
    blobs.into_iter().find_map(|(entry, blob)| match parse_credential_json(&blob) {
        Some(token) => Some((entry, token)),
        None => {
            debug!(entry, "Credential entry layout unrecognized");
            None
        }
    })
}

#[cfg(target_os = "windows")]
pub mod windows {
    use async_trait::async_trait;
    use tracing::{debug, warn};

    use super::{first_recognized_blob, CredentialSource, BLOB_MARKER, HELPER_TIMEOUT};
    use crate::core::models::usage::StoredToken;
    use crate::core::process::{run_command, which};

    /// Target names tried in order; Claude Code uses the first one.
    pub const TARGETS: &[&str] = &[
        "Claude Code-credentials",
        "Claude Code",
        "claude-code-credentials",
        "claude",
    ];

    // Reads a generic credential blob through advapi32 CredReadW. String
    // pointer fields need LPWStr marshalling to work on both 32 and 64 bit.
    const READER_CSHARP: &str = r#"
using System;
using System.Runtime.InteropServices;
using System.Text;
public class ClaudeCredReader {
    [DllImport("advapi32.dll", EntryPoint = "CredReadW", CharSet = CharSet.Unicode, SetLastError = true)]
    public static extern bool CredRead(string target, uint type, int flags, out IntPtr credPtr);

    [DllImport("advapi32.dll", SetLastError = true)]
    public static extern void CredFree(IntPtr buffer);

    [StructLayout(LayoutKind.Sequential, CharSet = CharSet.Unicode)]
    public struct CREDENTIAL {
        public uint Flags;
        public uint Type;
        [MarshalAs(UnmanagedType.LPWStr)] public string TargetName;
        [MarshalAs(UnmanagedType.LPWStr)] public string Comment;
        public long LastWritten;
        public uint CredentialBlobSize;
        public IntPtr CredentialBlob;
        public uint Persist;
        public uint AttributeCount;
        public IntPtr Attributes;
        [MarshalAs(UnmanagedType.LPWStr)] public string TargetAlias;
        [MarshalAs(UnmanagedType.LPWStr)] public string UserName;
    }

    public static string ReadBlob(string target) {
        IntPtr ptr = IntPtr.Zero;
        if (!CredRead(target, 1, 0, out ptr)) return null;
        try {
            var cred = (CREDENTIAL)Marshal.PtrToStructure(ptr, typeof(CREDENTIAL));
            if (cred.CredentialBlobSize == 0 || cred.CredentialBlob == IntPtr.Zero) return null;
            byte[] bytes = new byte[cred.CredentialBlobSize];
            Marshal.Copy(cred.CredentialBlob, bytes, 0, bytes.Length);
            return Encoding.Unicode.GetString(bytes);
        } finally {
            CredFree(ptr);
        }
    }
}
"#;

    pub struct WindowsCredentialSource {
        targets: Vec<String>,
    }

    impl WindowsCredentialSource {
        pub fn new() -> Self {
            Self {
                targets: TARGETS.iter().map(|t| t.to_string()).collect(),
            }
        }

        fn script(&self) -> String {
            let targets = self
                .targets
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "$ErrorActionPreference = 'Stop'\n\
                 try {{ Add-Type -TypeDefinition @'\n{}\n'@ -Language CSharp 2>$null }} catch {{}}\n\
                 foreach ($t in @({})) {{\n\
                 \x20   try {{ $blob = [ClaudeCredReader]::ReadBlob($t); if ($blob) {{ Write-Output \"{}$t\"; Write-Output $blob }} }} catch {{}}\n\
                 }}\n",
                READER_CSHARP, targets, BLOB_MARKER
            )
        }
    }

    #[async_trait]
    impl CredentialSource for WindowsCredentialSource {
        fn name(&self) -> &str {
            "Windows Credential Manager"
        }

        async fn probe(&self) -> Option<StoredToken> {
            if which("powershell").is_none() {
                debug!("powershell not on PATH, skipping Windows Credential Manager");
                return None;
            }
            let script = self.script();
            let args = ["-NoProfile", "-NonInteractive", "-Command", script.as_str()];
            let stdout = match run_command("powershell", &args, HELPER_TIMEOUT).await {
                Ok(out) => out,
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Windows Credential Manager read failed");
                    return None;
                }
            };
            if stdout.is_empty() {
                debug!("Windows Credential Manager: no Claude Code entry found");
                return None;
            }
            match first_recognized_blob(&stdout) {
                Some((entry, token)) => {
                    debug!(entry, "Auto-detected credentials from Windows Credential Manager");
                    Some(token)
                }
                None => {
                    debug!("Windows Credential Manager: no entry with a recognized layout");
                    None
                }
            }
        }
    }
}

#[cfg(target_os = "macos")]
pub mod macos {
    use async_trait::async_trait;
    use tracing::debug;

    use super::{CredentialSource, HELPER_TIMEOUT};
    use crate::core::auth::shapes::parse_credential_json;
    use crate::core::models::usage::StoredToken;
    use crate::core::process::{run_command, which};

    /// Keychain service name Claude Code stores its OAuth blob under.
    pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

    pub struct KeychainSource;

    impl KeychainSource {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl CredentialSource for KeychainSource {
        fn name(&self) -> &str {
            "macOS Keychain"
        }

        async fn probe(&self) -> Option<StoredToken> {
            if which("security").is_none() {
                debug!("security tool not on PATH, skipping Keychain");
                return None;
            }
            let args = ["find-generic-password", "-s", KEYCHAIN_SERVICE, "-w"];
            match run_command("security", &args, HELPER_TIMEOUT).await {
                Ok(blob) => {
                    let token = parse_credential_json(&blob);
                    if token.is_none() {
                        debug!("Keychain entry found but layout unrecognized");
                    }
                    token
                }
                Err(e) => {
                    debug!(error = %format!("{:#}", e), "No usable Keychain entry");
                    None
                }
            }
        }
    }
}
