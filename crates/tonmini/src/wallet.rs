use crate::errors::WalletError;
use crate::ton::wallet_v4::WalletV4;
use bip39::{Language, Mnemonic};
use ed25519_dalek::SigningKey;
use rand::Rng as _;
use serde::{Deserialize, Deserializer, Serialize};
use zeroize::Zeroizing;

pub const MNEMONIC_WORD_COUNT: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletRecord {
    /// Stored in plain text; at-rest encryption is out of scope for this wallet.
    #[serde(deserialize_with = "words_or_phrase")]
    pub mnemonic: Vec<String>,
    /// Bounceable user-friendly form; unique across the collection.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_non_bounceable: Option<String>,
}

impl WalletRecord {
    pub fn phrase(&self) -> String {
        self.mnemonic.join(" ")
    }
}

/// Older payloads kept the mnemonic as one space-separated string.
fn words_or_phrase<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Words(Vec<String>),
        Phrase(String),
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Words(w) => w,
        Repr::Phrase(p) => split_phrase(&p),
    })
}

pub struct WalletKeys {
    pub signing_key: SigningKey,
    pub wallet: WalletV4,
}

impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("wallet", &self.wallet)
            .finish_non_exhaustive()
    }
}

pub fn split_phrase(phrase: &str) -> Vec<String> {
    phrase.split_whitespace().map(str::to_lowercase).collect()
}

pub fn validate_word_count(words: &[String]) -> Result<(), WalletError> {
    if words.len() != MNEMONIC_WORD_COUNT {
        return Err(WalletError::validation(format!(
            "Mnemonic must contain exactly {MNEMONIC_WORD_COUNT} words (got {})",
            words.len()
        )));
    }
    Ok(())
}

/// 256 bits of entropy encode 24 words.
pub fn generate_mnemonic() -> Result<Vec<String>, WalletError> {
    let mut entropy = Zeroizing::new([0_u8; 32]);
    rand::rng().fill_bytes(entropy.as_mut_slice());
    let m = Mnemonic::from_entropy_in(Language::English, entropy.as_slice())
        .map_err(WalletError::derivation)?;
    Ok(m.words().map(str::to_owned).collect())
}

/// BIP-39 seed (empty passphrase); its first 32 bytes are the ed25519 secret seed.
pub fn derive_keys(words: &[String]) -> Result<WalletKeys, WalletError> {
    let phrase = Zeroizing::new(words.join(" "));
    let mnemonic =
        Mnemonic::parse_in_normalized(Language::English, &phrase).map_err(WalletError::derivation)?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));
    let mut secret = Zeroizing::new([0_u8; 32]);
    secret.copy_from_slice(seed.get(..32).unwrap_or(&[0_u8; 32]));
    let signing_key = SigningKey::from_bytes(&secret);
    let wallet = WalletV4::new(&signing_key.verifying_key());
    Ok(WalletKeys {
        signing_key,
        wallet,
    })
}

pub fn derive_wallet(words: &[String]) -> Result<WalletRecord, WalletError> {
    let keys = derive_keys(words)?;
    let addr = keys.wallet.address().map_err(WalletError::derivation)?;
    Ok(WalletRecord {
        mnemonic: words.to_vec(),
        address: addr.to_user_friendly(true, true, false),
        address_non_bounceable: Some(addr.to_user_friendly(false, true, false)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abandon_art() -> Vec<String> {
        let mut w = vec!["abandon".to_owned(); 23];
        w.push("art".to_owned());
        w
    }

    #[test]
    fn derivation_matches_known_vector() -> eyre::Result<()> {
        let keys = derive_keys(&abandon_art())?;
        assert_eq!(
            hex::encode(keys.signing_key.verifying_key().to_bytes()),
            "1de352e44cd333672593f2334a730e180aaf290de89aa16d480de594e34e2961"
        );
        let rec = derive_wallet(&abandon_art())?;
        assert_eq!(rec.address, "EQAIU0AT4GzbswY8UdnbQo92_ob0IxYgcAK6Cz04_AxuBEWC");
        assert_eq!(
            rec.address_non_bounceable.as_deref(),
            Some("UQAIU0AT4GzbswY8UdnbQo92_ob0IxYgcAK6Cz04_AxuBBhH")
        );
        Ok(())
    }

    #[test]
    fn generated_mnemonic_derives_deterministically() -> eyre::Result<()> {
        let words = generate_mnemonic()?;
        assert_eq!(words.len(), MNEMONIC_WORD_COUNT);
        let a = derive_wallet(&words)?;
        let b = derive_wallet(&words)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn bad_checksum_is_a_derivation_error() {
        let words = vec!["abandon".to_owned(); 24];
        assert!(matches!(
            derive_wallet(&words),
            Err(WalletError::Derivation(_))
        ));
    }

    #[test]
    fn word_count_is_enforced() {
        let words = split_phrase(&"abandon ".repeat(23));
        let err = validate_word_count(&words).err();
        assert_eq!(
            err.map(|e| e.to_string()),
            Some("Mnemonic must contain exactly 24 words (got 23)".to_owned())
        );
        assert!(validate_word_count(&abandon_art()).is_ok());
    }

    #[test]
    fn record_accepts_phrase_string() -> eyre::Result<()> {
        let json = r#"{"mnemonic":"abandon  Abandon art","address":"EQx"}"#;
        let rec: WalletRecord = serde_json::from_str(json)?;
        assert_eq!(rec.mnemonic, vec!["abandon", "abandon", "art"]);
        assert_eq!(rec.address_non_bounceable, None);
        Ok(())
    }
}
