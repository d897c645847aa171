use sha2::{Digest, Sha256};

/// Turns a password into a stored credential and checks candidates against it
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;

    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Salted SHA-256, stored as `<salt>$<hex digest>`.
///
/// Enough for the in-memory account table; a real deployment plugs a
/// slow KDF in behind [`PasswordHasher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256PasswordHasher;

impl Sha256PasswordHasher {
    fn digest(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"$");
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, password: &str) -> String {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        format!("{}${}", salt, Self::digest(&salt, password))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        match stored.split_once('$') {
            Some((salt, digest)) => Self::digest(salt, password) == digest,
            None => false,
        }
    }
}
