//! Host key loading and fingerprinting

use std::path::Path;

use russh_keys::PublicKeyBase64;
use russh_keys::key::KeyPair;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostKeyError {
    #[error("could not read host key {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The key material is encrypted and no passphrase was supplied.
    #[error("host key is passphrase-protected")]
    PassphraseRequired,
    #[error("could not decode host key: {0}")]
    Decode(#[from] russh_keys::Error),
}

/// Decode the server's private key without a passphrase.
pub fn load_host_key(path: &Path) -> Result<KeyPair, HostKeyError> {
    decode(path, None)
}

/// Decode the host key, prompting once for a passphrase if the key turns
/// out to be encrypted. The prompt does not echo. A wrong passphrase is
/// fatal; there is no second attempt.
pub fn load_host_key_interactive(path: &Path) -> anyhow::Result<KeyPair> {
    match load_host_key(path) {
        Ok(key) => Ok(key),
        Err(HostKeyError::PassphraseRequired) => {
            let passphrase = rpassword::prompt_password("Private key passphrase: ")?;
            Ok(decode(path, Some(&passphrase))?)
        }
        Err(e) => Err(e.into()),
    }
}

/// `<algorithm> SHA256:<digest>` for the public half of the host key.
pub fn fingerprint(key: &KeyPair) -> anyhow::Result<String> {
    let public = key.clone_public_key()?;
    Ok(format!("{} SHA256:{}", public.name(), public.fingerprint()))
}

fn decode(path: &Path, passphrase: Option<&str>) -> Result<KeyPair, HostKeyError> {
    let pem = std::fs::read_to_string(path).map_err(|source| HostKeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match russh_keys::decode_secret_key(&pem, passphrase) {
        Ok(key) => Ok(key),
        Err(russh_keys::Error::KeyIsEncrypted) => Err(HostKeyError::PassphraseRequired),
        Err(e) => Err(HostKeyError::Decode(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_key_file_is_an_io_error() {
        let err = load_host_key(Path::new("/nonexistent/host_key")).unwrap_err();
        assert!(matches!(err, HostKeyError::Io { .. }));
    }

    #[test]
    fn test_garbage_key_material_is_a_decode_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not a private key").unwrap();
        let err = load_host_key(file.path()).unwrap_err();
        assert!(!matches!(err, HostKeyError::PassphraseRequired));
        assert!(!matches!(err, HostKeyError::Io { .. }));
    }

    #[test]
    fn test_fingerprint_of_generated_key() {
        let key = KeyPair::generate_ed25519().unwrap();
        let rendered = fingerprint(&key).unwrap();
        assert!(rendered.starts_with("ssh-ed25519 SHA256:"));
    }
}
