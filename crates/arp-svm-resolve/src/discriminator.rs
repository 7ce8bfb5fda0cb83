//! Anchor instruction discriminators.

use sha2::{Digest, Sha256};

/// Prefix the resolver puts in front of an instruction name to reach its
/// preflight handler.
pub const PREFLIGHT_PREFIX: &str = "preflight_";

/// `sha256("global:" + name)[..8]`
pub fn discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::new()
        .chain_update(b"global:")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Discriminator of the `preflight_<name>` variant of an instruction.
pub fn preflight_discriminator(name: &str) -> [u8; 8] {
    discriminator(&format!("{PREFLIGHT_PREFIX}{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_anchor_discriminator() {
        // Anchor's `initialize` handler.
        assert_eq!(
            discriminator("initialize"),
            [175, 175, 109, 31, 13, 152, 155, 237]
        );
    }

    #[test]
    fn test_preflight_is_prefixed_name() {
        assert_eq!(
            preflight_discriminator("do_thing"),
            discriminator("preflight_do_thing")
        );
        assert_ne!(preflight_discriminator("do_thing"), discriminator("do_thing"));
    }
}
