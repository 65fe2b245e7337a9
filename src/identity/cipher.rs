use crate::error::IdentityError;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;
use std::str::FromStr;

const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// How the CBC initialization vector is chosen.
///
/// `KeyAsIv` reuses the first block of the key as the IV. It is deterministic and
/// weak (equal ids produce equal tokens) but interoperates with tokens minted by
/// existing deployments. `Random` draws a fresh IV per token and ships it as the
/// first 16 bytes of the decoded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvMode {
    KeyAsIv,
    Random,
}

impl FromStr for IvMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compat" | "key" | "key-as-iv" => Ok(IvMode::KeyAsIv),
            "random" => Ok(IvMode::Random),
            other => Err(format!("unknown IV mode `{}` (expected compat|random)", other)),
        }
    }
}

/// Mints and verifies identity tokens under a shared symmetric key.
#[derive(Clone)]
pub struct SignedIdentity {
    key: Vec<u8>,
    iv_mode: IvMode,
}

impl fmt::Debug for SignedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedIdentity")
            .field("key_len", &self.key.len())
            .field("iv_mode", &self.iv_mode)
            .finish()
    }
}

impl SignedIdentity {
    /// The key length selects AES-128, AES-192 or AES-256.
    pub fn new(key: impl Into<Vec<u8>>, iv_mode: IvMode) -> Result<Self, IdentityError> {
        let key = key.into();
        match key.len() {
            16 | 24 | 32 => Ok(Self { key, iv_mode }),
            n => Err(IdentityError::InvalidKeyLength(n)),
        }
    }

    /// Pads `id` with PKCS#7, encrypts it with AES-CBC and base64-encodes the result.
    pub fn sign(&self, id: &[u8]) -> String {
        let token = match self.iv_mode {
            IvMode::KeyAsIv => self.encrypt(id, self.key_iv()),
            IvMode::Random => {
                let iv: [u8; BLOCK_SIZE] = rand::random();
                let mut out = iv.to_vec();
                out.extend(self.encrypt(id, &iv));
                out
            }
        };
        STANDARD.encode(token)
    }

    /// Opens a token back into the id bytes it was minted for.
    pub fn open(&self, token: &str) -> Result<Vec<u8>, IdentityError> {
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|_| IdentityError::Decode)?;

        match self.iv_mode {
            IvMode::KeyAsIv => self.decrypt(&raw, self.key_iv()),
            IvMode::Random => {
                if raw.len() < BLOCK_SIZE {
                    return Err(IdentityError::Decrypt);
                }
                let (iv, ciphertext) = raw.split_at(BLOCK_SIZE);
                self.decrypt(ciphertext, iv)
            }
        }
    }

    /// True iff `token` decrypts to exactly `raw_id`. Malformed tokens are `false`.
    pub fn verify(&self, raw_id: &[u8], token: &str) -> bool {
        match self.open(token) {
            Ok(plain) => plain == raw_id,
            Err(e) => {
                tracing::debug!("Identity token rejected: {}", e);
                false
            }
        }
    }

    fn key_iv(&self) -> &[u8] {
        &self.key[..BLOCK_SIZE]
    }

    fn encrypt(&self, plain: &[u8], iv: &[u8]) -> Vec<u8> {
        // Key length was validated in `new` and IVs are always one block.
        match self.key.len() {
            16 => Aes128CbcEnc::new_from_slices(&self.key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plain))
                .unwrap_or_default(),
            24 => Aes192CbcEnc::new_from_slices(&self.key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plain))
                .unwrap_or_default(),
            _ => Aes256CbcEnc::new_from_slices(&self.key, iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plain))
                .unwrap_or_default(),
        }
    }

    fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, IdentityError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(IdentityError::Decrypt);
        }
        let plain = match self.key.len() {
            16 => Aes128CbcDec::new_from_slices(&self.key, iv)
                .map_err(|_| IdentityError::Decrypt)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            24 => Aes192CbcDec::new_from_slices(&self.key, iv)
                .map_err(|_| IdentityError::Decrypt)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            _ => Aes256CbcDec::new_from_slices(&self.key, iv)
                .map_err(|_| IdentityError::Decrypt)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };
        plain.map_err(|_| IdentityError::Decrypt)
    }
}
