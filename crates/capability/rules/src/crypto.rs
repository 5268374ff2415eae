//! 规则脚本可用的 AES-CBC 加解密。
//!
//! 不做填充：数据长度必须是分组长度的整数倍，输出与输入等长。

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

/// AES 分组长度。
pub const AES_BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// 加解密错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key size {0}")]
    KeySize(usize),
    #[error("size of the IV {0} is not the same as block size 16")]
    IvSize(usize),
    #[error("payload length {0} is not a multiple of AES block size 16")]
    PayloadLength(usize),
    #[error("encrypted payload length {0} is not a multiple of AES block size 16")]
    EncryptedLength(usize),
    #[error("failed to decode {field}: {reason}")]
    Decode { field: &'static str, reason: String },
    #[error("cipher error: {0}")]
    Cipher(String),
}

/// AES-CBC 加密，密钥 16/24/32 字节对应 AES-128/192/256。
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key_iv(key, iv)?;
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::PayloadLength(data.len()));
    }
    let mut buf = data.to_vec();
    if buf.is_empty() {
        return Ok(buf);
    }
    let len = buf.len();
    let result = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map(|_| ()),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map(|_| ()),
        _ => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map(|_| ()),
    };
    result.map_err(cipher_error)?;
    Ok(buf)
}

/// AES-CBC 解密。
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key_iv(key, iv)?;
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::EncryptedLength(data.len()));
    }
    let mut buf = data.to_vec();
    if buf.is_empty() {
        return Ok(buf);
    }
    let result = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map(|_| ()),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map(|_| ()),
        _ => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(cipher_error)?
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map(|_| ()),
    };
    result.map_err(cipher_error)?;
    Ok(buf)
}

/// 依次解码十六进制的密钥、IV 与数据。
pub fn decode_params(
    key: &str,
    iv: &str,
    data: &str,
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), CryptoError> {
    let decode = |field: &'static str, value: &str| {
        hex::decode(value).map_err(|err| CryptoError::Decode {
            field,
            reason: err.to_string(),
        })
    };
    Ok((decode("key", key)?, decode("IV", iv)?, decode("data", data)?))
}

fn check_key_iv(key: &[u8], iv: &[u8]) -> Result<(), CryptoError> {
    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(CryptoError::KeySize(key.len()));
    }
    if iv.len() != AES_BLOCK_SIZE {
        return Err(CryptoError::IvSize(iv.len()));
    }
    Ok(())
}

fn cipher_error(err: impl std::fmt::Display) -> CryptoError {
    CryptoError::Cipher(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIST SP 800-38A F.2.1 第一个分组
    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const IV: &str = "000102030405060708090a0b0c0d0e0f";
    const PLAIN: &str = "6bc1bee22e409f96e93d7e117393172a";
    const CIPHER: &str = "7649abac8119b246cee98e9b12e9197d";

    #[test]
    fn matches_known_vector() {
        let (key, iv, plain) = decode_params(KEY, IV, PLAIN).expect("decode");
        let encrypted = aes_cbc_encrypt(&key, &iv, &plain).expect("encrypt");
        assert_eq!(hex::encode(&encrypted), CIPHER);
        assert_eq!(aes_cbc_decrypt(&key, &iv, &encrypted).expect("decrypt"), plain);
    }

    #[test]
    fn larger_keys_round_trip() {
        let iv = [7u8; AES_BLOCK_SIZE];
        let data = b"sensor reading: 0042 degrees!!!!".to_vec();
        for size in [24, 32] {
            let key = vec![3u8; size];
            let encrypted = aes_cbc_encrypt(&key, &iv, &data).expect("encrypt");
            assert_eq!(encrypted.len(), data.len());
            assert_ne!(encrypted, data);
            assert_eq!(aes_cbc_decrypt(&key, &iv, &encrypted).expect("decrypt"), data);
        }
    }

    #[test]
    fn empty_data_stays_empty() {
        let key = [1u8; 16];
        let iv = [0u8; AES_BLOCK_SIZE];
        assert!(aes_cbc_encrypt(&key, &iv, &[]).expect("encrypt").is_empty());
        assert!(aes_cbc_decrypt(&key, &iv, &[]).expect("decrypt").is_empty());
    }

    #[test]
    fn rejects_bad_sizes() {
        let key = [1u8; 16];
        let iv = [0u8; AES_BLOCK_SIZE];
        let block = [0u8; 16];
        assert_eq!(aes_cbc_encrypt(&[0u8; 8], &iv, &block), Err(CryptoError::KeySize(8)));
        assert_eq!(aes_cbc_encrypt(&[], &iv, &block), Err(CryptoError::KeySize(0)));
        assert_eq!(aes_cbc_encrypt(&key, &[0u8; 8], &block), Err(CryptoError::IvSize(8)));
        assert_eq!(aes_cbc_encrypt(&key, &iv, &[0u8; 15]), Err(CryptoError::PayloadLength(15)));
        assert_eq!(
            aes_cbc_decrypt(&key, &iv, &[0u8; 17]),
            Err(CryptoError::EncryptedLength(17))
        );
        assert_eq!(
            CryptoError::IvSize(8).to_string(),
            "size of the IV 8 is not the same as block size 16"
        );
    }

    #[test]
    fn decode_reports_first_bad_field() {
        let err = decode_params(KEY, "zz", "also bad").expect_err("bad iv");
        assert!(matches!(err, CryptoError::Decode { field: "IV", .. }));
        assert!(err.to_string().starts_with("failed to decode IV: "));
    }
}
