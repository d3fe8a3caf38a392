//! Removal of the PDF standard security handler
//!
//! Restricted documents are encrypted with an empty user password; their
//! restrictions are permission bits in the /Encrypt dictionary. Opening such a
//! document with the empty password yields the file key, every string and
//! stream is decrypted in place, and the /Encrypt entry is dropped, which
//! removes the restrictions together with the encryption.
//!
//! Handlers understood:
//!
//! - V1/V2 (R2, R3): RC4, key derivation and object keys from `lopdf`
//! - V4 (R4): crypt filters, AESV2 (AES-128-CBC) or V2 (RC4)
//! - V5 (R5, R6): AESV3 (AES-256-CBC) with SHA-2 password hashing
//!
//! A document that needs a non-empty user password is reported as
//! [`ConvertError::PasswordRequired`], anything else as
//! [`ConvertError::UnsupportedEncryption`].

use crate::error::ConvertError;
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use lopdf::encryption::{self, DecryptionError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Password padding string of the standard security handler.
const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const AES_BLOCK: usize = 16;

/// File key length of V4 handlers, in bytes.
const V4_KEY_LEN: usize = 16;

/// Passwords of R5/R6 handlers are truncated to this many UTF-8 bytes.
const MAX_AES256_PASSWORD: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
    AesV3,
}

/// File key plus the crypt methods that apply to strings and streams.
#[derive(Debug)]
struct SecurityHandler {
    key: Vec<u8>,
    strings: CryptMethod,
    streams: CryptMethod,
    encrypt_metadata: bool,
}

/// Decrypt `doc` with the empty user password and drop its /Encrypt entry.
///
/// Does nothing for documents that are not encrypted.
pub(crate) fn remove_security(doc: &mut Document) -> Result<(), ConvertError> {
    let (encrypt_id, dict) = match doc.trailer.get(b"Encrypt") {
        Ok(Object::Reference(id)) => {
            let dict = doc.get_dictionary(*id).map_err(|e| {
                ConvertError::InvalidDocument(format!("Broken /Encrypt dictionary: {}", e))
            })?;
            (Some(*id), dict.clone())
        }
        Ok(Object::Dictionary(dict)) => (None, dict.clone()),
        Ok(_) => {
            return Err(ConvertError::InvalidDocument(
                "Malformed /Encrypt entry".to_string(),
            ))
        }
        Err(_) => return Ok(()),
    };

    let handler = SecurityHandler::open(doc, &dict, b"")?;
    debug!(
        strings = ?handler.strings,
        streams = ?handler.streams,
        key_len = handler.key.len(),
        "Removing document security"
    );

    for (&id, object) in doc.objects.iter_mut() {
        if Some(id) == encrypt_id {
            continue;
        }
        handler.decrypt_object(id, object)?;
    }

    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }
    doc.trailer.remove(b"Encrypt");
    Ok(())
}

impl SecurityHandler {
    fn open(doc: &Document, dict: &Dictionary, password: &[u8]) -> Result<Self, ConvertError> {
        let filter = dict.get(b"Filter").and_then(Object::as_name).unwrap_or(b"");
        if filter != b"Standard" {
            return Err(ConvertError::UnsupportedEncryption(format!(
                "security handler /{}",
                String::from_utf8_lossy(filter)
            )));
        }

        let version = dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        let revision = dict.get(b"R").and_then(Object::as_i64).map_err(|_| {
            ConvertError::InvalidDocument("Encryption revision /R is missing".to_string())
        })?;
        let encrypt_metadata = dict
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        match (version, revision) {
            (1 | 2, 2 | 3) => {
                let key = encryption::get_encryption_key(doc, password, true)
                    .map_err(from_decryption_error)?;
                Ok(Self {
                    key,
                    strings: CryptMethod::Rc4,
                    streams: CryptMethod::Rc4,
                    encrypt_metadata: true,
                })
            }
            (4, 4) => {
                let strings = crypt_filter(dict, b"StrF")?;
                let streams = crypt_filter(dict, b"StmF")?;
                if strings == CryptMethod::AesV3 || streams == CryptMethod::AesV3 {
                    return Err(ConvertError::UnsupportedEncryption(
                        "AESV3 crypt filter in a V4 handler".to_string(),
                    ));
                }
                let file_id = first_file_id(doc);
                let key = legacy_file_key(dict, password, &file_id, revision, encrypt_metadata)?;
                if !legacy_user_password_matches(&key, &file_id, string_entry(dict, b"U")?) {
                    return Err(ConvertError::PasswordRequired);
                }
                Ok(Self {
                    key,
                    strings,
                    streams,
                    encrypt_metadata,
                })
            }
            (5, 5 | 6) => Ok(Self {
                key: aes256_file_key(dict, password, revision)?,
                strings: crypt_filter(dict, b"StrF")?,
                streams: crypt_filter(dict, b"StmF")?,
                encrypt_metadata,
            }),
            (v, r) => Err(ConvertError::UnsupportedEncryption(format!(
                "algorithm V{} revision R{}",
                v, r
            ))),
        }
    }

    fn decrypt_object(&self, id: ObjectId, object: &mut Object) -> Result<(), ConvertError> {
        match object {
            Object::String(bytes, _) => {
                *bytes = self.decrypt_bytes(self.strings, id, bytes)?;
            }
            Object::Array(items) => {
                for item in items {
                    self.decrypt_object(id, item)?;
                }
            }
            Object::Dictionary(dict) => self.decrypt_dictionary(id, dict)?,
            Object::Stream(stream) => {
                self.decrypt_dictionary(id, &mut stream.dict)?;
                if self.stream_is_encrypted(&stream.dict) {
                    let content = self.decrypt_bytes(self.streams, id, &stream.content)?;
                    stream.set_content(content);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn decrypt_dictionary(&self, id: ObjectId, dict: &mut Dictionary) -> Result<(), ConvertError> {
        // Signature values are stored in the clear
        let is_signature = has_type(dict, b"Sig");
        for (key, value) in dict.iter_mut() {
            if is_signature && key.as_slice() == b"Contents" {
                continue;
            }
            self.decrypt_object(id, value)?;
        }
        Ok(())
    }

    fn stream_is_encrypted(&self, dict: &Dictionary) -> bool {
        if has_type(dict, b"XRef") {
            return false;
        }
        self.encrypt_metadata || !has_type(dict, b"Metadata")
    }

    fn decrypt_bytes(
        &self,
        method: CryptMethod,
        id: ObjectId,
        data: &[u8],
    ) -> Result<Vec<u8>, ConvertError> {
        let failed = |reason: String| {
            ConvertError::InvalidDocument(format!(
                "Object {} {} could not be decrypted: {}",
                id.0, id.1, reason
            ))
        };

        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => {
                encryption::decrypt_object(&self.key, id, &Object::string_literal(data.to_vec()))
                    .map_err(|e| failed(e.to_string()))
            }
            CryptMethod::AesV2 => {
                aes_cbc_decrypt(&legacy_aes_object_key(&self.key, id), data).map_err(failed)
            }
            CryptMethod::AesV3 => aes_cbc_decrypt(&self.key, data).map_err(failed),
        }
    }
}

fn from_decryption_error(e: DecryptionError) -> ConvertError {
    match e {
        DecryptionError::IncorrectPassword => ConvertError::PasswordRequired,
        DecryptionError::UnsupportedEncryption
        | DecryptionError::InvalidKeyLength
        | DecryptionError::InvalidRevision => ConvertError::UnsupportedEncryption(e.to_string()),
        other => ConvertError::InvalidDocument(format!("Broken /Encrypt dictionary: {}", other)),
    }
}

fn has_type(dict: &Dictionary, name: &[u8]) -> bool {
    matches!(dict.get(b"Type").and_then(Object::as_name), Ok(n) if n == name)
}

fn string_entry<'a>(dict: &'a Dictionary, key: &[u8]) -> Result<&'a [u8], ConvertError> {
    dict.get(key).and_then(Object::as_str).map_err(|_| {
        ConvertError::InvalidDocument(format!(
            "/Encrypt entry /{} is missing",
            String::from_utf8_lossy(key)
        ))
    })
}

fn first_file_id(doc: &Document) -> Vec<u8> {
    doc.trailer
        .get(b"ID")
        .and_then(Object::as_array)
        .ok()
        .and_then(|ids| ids.first())
        .and_then(|id| id.as_str().ok())
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

/// Crypt method named by the /StrF or /StmF entry of a V4+ handler.
fn crypt_filter(dict: &Dictionary, entry: &[u8]) -> Result<CryptMethod, ConvertError> {
    let name = match dict.get(entry).and_then(Object::as_name) {
        Ok(name) => name,
        Err(_) => return Ok(CryptMethod::Identity),
    };
    if name == b"Identity" {
        return Ok(CryptMethod::Identity);
    }

    let method = dict
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|filters| filters.get(name))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(b"None");

    match method {
        b"None" => Ok(CryptMethod::Identity),
        b"V2" => Ok(CryptMethod::Rc4),
        b"AESV2" => Ok(CryptMethod::AesV2),
        b"AESV3" => Ok(CryptMethod::AesV3),
        other => Err(ConvertError::UnsupportedEncryption(format!(
            "crypt filter method /{}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn padded_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PAD_BYTES;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PAD_BYTES[..32 - len]);
    padded
}

/// File key of revision 2-4 handlers: MD5 over the padded password, /O, /P
/// and the first file identifier, rehashed 50 times from R3 on.
fn legacy_file_key(
    dict: &Dictionary,
    password: &[u8],
    file_id: &[u8],
    revision: i64,
    encrypt_metadata: bool,
) -> Result<Vec<u8>, ConvertError> {
    let owner = string_entry(dict, b"O")?;
    let permissions = dict.get(b"P").and_then(Object::as_i64).map_err(|_| {
        ConvertError::InvalidDocument("/Encrypt entry /P is missing".to_string())
    })? as i32;

    let mut context = md5::Context::new();
    context.consume(padded_password(password));
    context.consume(owner);
    context.consume(permissions.to_le_bytes());
    context.consume(file_id);
    if revision >= 4 && !encrypt_metadata {
        context.consume([0xFF; 4]);
    }

    let mut digest = context.compute().0;
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(&digest[..V4_KEY_LEN]).0;
        }
    }
    Ok(digest[..V4_KEY_LEN].to_vec())
}

/// Recompute /U for `key` (revision 3 and later) and compare the first 16 bytes.
fn legacy_user_password_matches(key: &[u8], file_id: &[u8], user_entry: &[u8]) -> bool {
    if user_entry.len() < 16 {
        return false;
    }

    let mut context = md5::Context::new();
    context.consume(PAD_BYTES);
    context.consume(file_id);
    let mut data = context.compute().0;

    for round in 0..20u8 {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
        match Rc4::<U16>::new_from_slice(&round_key) {
            Ok(mut cipher) => cipher.apply_keystream(&mut data),
            Err(_) => return false,
        }
    }
    data[..] == user_entry[..16]
}

/// Per-object AES-128 key: MD5 of the file key, the low object number and
/// generation bytes, and the "sAlT" suffix.
fn legacy_aes_object_key(key: &[u8], id: ObjectId) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(key);
    context.consume(&id.0.to_le_bytes()[..3]);
    context.consume(&id.1.to_le_bytes()[..2]);
    context.consume(b"sAlT");
    context.compute().0.to_vec()
}

/// AES-CBC with the IV in the first block and PKCS#7 padding.
fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
    if data.len() <= AES_BLOCK {
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(AES_BLOCK);

    let plain = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|e| e.to_string())?
            .decrypt_padded_vec_mut::<Pkcs7>(body),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| e.to_string())?
            .decrypt_padded_vec_mut::<Pkcs7>(body),
        n => return Err(format!("unexpected AES key length {}", n)),
    };
    plain.map_err(|e| e.to_string())
}

/// File key of R5/R6 handlers: validate the password against /U, then
/// unwrap /UE with the password-derived intermediate key.
fn aes256_file_key(
    dict: &Dictionary,
    password: &[u8],
    revision: i64,
) -> Result<Vec<u8>, ConvertError> {
    let password = &password[..password.len().min(MAX_AES256_PASSWORD)];
    let user = string_entry(dict, b"U")?;
    let user_key = string_entry(dict, b"UE")?;
    if user.len() < 48 || user_key.len() != 32 {
        return Err(ConvertError::InvalidDocument(
            "/Encrypt entries /U or /UE have the wrong length".to_string(),
        ));
    }

    let (validation_salt, key_salt) = (&user[32..40], &user[40..48]);
    if password_hash(password, validation_salt, &[], revision)? != user[..32] {
        return Err(ConvertError::PasswordRequired);
    }

    let intermediate = password_hash(password, key_salt, &[], revision)?;
    Aes256CbcDec::new_from_slices(&intermediate, &[0u8; AES_BLOCK])
        .map_err(|e| ConvertError::OperationError(e.to_string()))?
        .decrypt_padded_vec_mut::<NoPadding>(user_key)
        .map_err(|e| ConvertError::InvalidDocument(format!("Could not unwrap /UE: {}", e)))
}

/// Password hash of R5 (plain SHA-256) and R6 (iterated SHA-2 with AES rounds).
fn password_hash(
    password: &[u8],
    salt: &[u8],
    user_entry: &[u8],
    revision: i64,
) -> Result<Vec<u8>, ConvertError> {
    let mut k = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(user_entry)
        .finalize()
        .to_vec();
    if revision < 6 {
        return Ok(k);
    }

    let mut round: u32 = 0;
    loop {
        let mut block = Vec::with_capacity(64 * (password.len() + k.len() + user_entry.len()));
        for _ in 0..64 {
            block.extend_from_slice(password);
            block.extend_from_slice(&k);
            block.extend_from_slice(user_entry);
        }

        let e = Aes128CbcEnc::new_from_slices(&k[..16], &k[16..32])
            .map_err(|e| ConvertError::OperationError(e.to_string()))?
            .encrypt_padded_vec_mut::<NoPadding>(&block);

        let selector: u32 = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        let last = e.last().copied().unwrap_or(0) as u32;
        if round >= 64 && last + 32 <= round {
            break;
        }
    }

    k.truncate(32);
    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        page_labels, RESTRICTED_AES128_PDF, RESTRICTED_AES256_PDF, RESTRICTED_RC4_PDF,
        USER_PASSWORD_PDF,
    };
    use lopdf::dictionary;

    fn unlocked(bytes: &[u8]) -> Result<Document, ConvertError> {
        let mut doc = Document::load_mem(bytes).unwrap();
        remove_security(&mut doc)?;
        Ok(doc)
    }

    fn info_title(doc: &Document) -> Vec<u8> {
        let info = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .unwrap();
        doc.get_dictionary(info)
            .unwrap()
            .get(b"Title")
            .and_then(Object::as_str)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_rc4_document_is_decrypted() {
        let doc = unlocked(RESTRICTED_RC4_PDF).unwrap();
        assert!(!doc.trailer.has(b"Encrypt"));
        assert_eq!(
            page_labels(&doc),
            vec!["Restricted-Page-1", "Restricted-Page-2", "Restricted-Page-3"]
        );
        assert_eq!(info_title(&doc), b"Lecture Notes");
    }

    #[test]
    fn test_aes128_document_is_decrypted() {
        let doc = unlocked(RESTRICTED_AES128_PDF).unwrap();
        assert!(!doc.trailer.has(b"Encrypt"));
        assert_eq!(page_labels(&doc)[1], "Restricted-Page-2");
        assert_eq!(info_title(&doc), b"Lecture Notes");
    }

    #[test]
    fn test_aes256_document_is_decrypted() {
        let doc = unlocked(RESTRICTED_AES256_PDF).unwrap();
        assert!(!doc.trailer.has(b"Encrypt"));
        assert_eq!(page_labels(&doc)[2], "Restricted-Page-3");
        assert_eq!(info_title(&doc), b"Lecture Notes");
    }

    #[test]
    fn test_strings_inside_arrays_are_decrypted() {
        let doc = unlocked(RESTRICTED_AES256_PDF).unwrap();
        let info = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .unwrap();
        let keywords = doc
            .get_dictionary(info)
            .unwrap()
            .get(b"Keywords")
            .and_then(Object::as_array)
            .unwrap();
        assert_eq!(keywords[0].as_str().unwrap(), b"biology");
    }

    #[test]
    fn test_user_password_is_reported_separately() {
        let result = unlocked(USER_PASSWORD_PDF);
        assert!(matches!(result, Err(ConvertError::PasswordRequired)));
    }

    #[test]
    fn test_unknown_handler_is_unsupported() {
        let mut doc = Document::load_mem(RESTRICTED_AES128_PDF).unwrap();
        let encrypt = doc
            .trailer
            .get(b"Encrypt")
            .and_then(Object::as_reference)
            .unwrap();
        doc.objects.insert(
            encrypt,
            Object::Dictionary(dictionary! {
                "Filter" => "Standard",
                "V" => 3,
                "R" => 3,
            }),
        );

        let result = remove_security(&mut doc);
        assert!(matches!(result, Err(ConvertError::UnsupportedEncryption(_))));
    }

    #[test]
    fn test_public_key_handler_is_unsupported() {
        let mut doc = Document::load_mem(RESTRICTED_RC4_PDF).unwrap();
        doc.trailer.set(
            "Encrypt",
            dictionary! { "Filter" => "Adobe.PubSec", "V" => 4, "R" => 4 },
        );

        let err = remove_security(&mut doc).unwrap_err();
        assert!(err.to_string().contains("Adobe.PubSec"), "{}", err);
    }

    #[test]
    fn test_plain_document_is_left_alone() {
        let bytes = crate::testing::create_test_pdf(2, "Plain");
        let mut doc = Document::load_mem(&bytes).unwrap();
        let before = doc.objects.len();
        remove_security(&mut doc).unwrap();
        assert_eq!(doc.objects.len(), before);
    }

    #[test]
    fn test_padded_password_uses_pad_bytes() {
        assert_eq!(padded_password(b""), PAD_BYTES);
        let padded = padded_password(b"ab");
        assert_eq!(&padded[..2], b"ab");
        assert_eq!(&padded[2..], &PAD_BYTES[..30]);
    }
}
