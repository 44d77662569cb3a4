/// CMS (PKCS#7) enveloped-data encryption wrapping the inner archive for N
/// X.509-certificate recipients, per §6 "Encrypted container". Each file
/// gets a fresh random AES-256-CBC content-encryption key (CEK), itself
/// wrapped once per recipient under their certificate's RSA public key
/// (key-transport recipient info, RFC 5652 §6.2.1).
///
/// The `cms` crate's builder API covers originator-driven signing/enveloping
/// flows we don't need here and doesn't give us a plain "encrypt these bytes
/// for these recipients" entry point, so `EnvelopedData` is assembled
/// directly from its RFC 5652 struct shape instead.
use crate::error::{OrcError, Result};
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use cms::cert::IssuerAndSerialNumber;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{EncryptedContentInfo, EnvelopedData, KeyTransRecipientInfo, RecipientIdentifier, RecipientInfo};
use der::asn1::{Any, ObjectIdentifier, OctetString, SetOfVec};
use der::{Encode, Tag};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use spki::AlgorithmIdentifierOwned;
use std::io::Write;
use x509_cert::Certificate;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

pub const ENCRYPTED_EXTENSION: &str = "p7b";

const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_ENVELOPED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.3");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const AES256_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.42");

/// One configured CMS recipient.
pub struct Recipient {
    pub certificate: Certificate,
}

/// Encrypts `plaintext` for `recipients` as a CMS `EnvelopedData` structure,
/// returning the DER-encoded CMS bytes.
///
/// The content-encryption key and IV are freshly generated per call (i.e.
/// per file, matching the "fresh random CEK per file" contract); recipient
/// key-wrapping uses RSA key-transport when the recipient certificate
/// carries an RSA public key — the only transport this module implements,
/// noted as the supported case rather than the exhaustive one.
pub fn encrypt_for_recipients(plaintext: &[u8], recipients: &[Recipient]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(OrcError::Config {
            reason: "CMS encryption requested with zero recipients".into(),
        });
    }

    let mut cek = [0u8; 32];
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut cek);
    OsRng.fill_bytes(&mut iv);

    let ciphertext = aes256_cbc_encrypt(&cek, &iv, plaintext);

    let mut recipient_infos = SetOfVec::new();
    for recipient in recipients {
        let ktri = key_trans_recipient_info(recipient, &cek)?;
        recipient_infos
            .insert(RecipientInfo::Ktri(ktri))
            .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    }

    let iv_param =
        Any::new(Tag::OctetString, iv.to_vec()).map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    let encrypted_content_info = EncryptedContentInfo {
        content_type: ID_DATA,
        content_enc_alg: AlgorithmIdentifierOwned { oid: AES256_CBC, parameters: Some(iv_param) },
        encrypted_content: Some(
            OctetString::new(ciphertext).map_err(|e| OrcError::Archive { reason: e.to_string() })?,
        ),
    };

    let enveloped = EnvelopedData {
        version: CmsVersion::V0,
        originator_info: None,
        recip_infos: recipient_infos,
        encrypted_content_info,
        unprotected_attrs: None,
    };

    let enveloped_der = enveloped.to_der().map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    let content = Any::new(Tag::Sequence, enveloped_der).map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    let content_info = ContentInfo { content_type: ID_ENVELOPED_DATA, content };

    content_info.to_der().map_err(|e| OrcError::Archive { reason: e.to_string() })
}

/// Builds one `KeyTransRecipientInfo`: the CEK wrapped under `recipient`'s
/// RSA public key (RSAES-PKCS1-v1_5), identified by issuer + serial number.
fn key_trans_recipient_info(recipient: &Recipient, cek: &[u8; 32]) -> Result<KeyTransRecipientInfo> {
    let tbs = &recipient.certificate.tbs_certificate;
    let spki_der = tbs
        .subject_public_key_info
        .to_der()
        .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| OrcError::Archive {
        reason: format!("recipient certificate does not carry a usable RSA public key: {e}"),
    })?;
    let encrypted_key = public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, cek)
        .map_err(|e| OrcError::Archive { reason: e.to_string() })?;

    Ok(KeyTransRecipientInfo {
        version: CmsVersion::V0,
        rid: RecipientIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: tbs.issuer.clone(),
            serial_number: tbs.serial_number.clone(),
        }),
        key_enc_alg: AlgorithmIdentifierOwned { oid: RSA_ENCRYPTION, parameters: None },
        encrypted_key: OctetString::new(encrypted_key).map_err(|e| OrcError::Archive { reason: e.to_string() })?,
    })
}

fn aes256_cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let encryptor = Aes256CbcEnc::new(key.into(), iv.into());
    encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Writer adapter that CBC-encrypts bytes written to it and forwards the
/// ciphertext downstream, for use as one link in the encrypted-sink chain
/// described in §4.7; callers finalize with PKCS7 padding via `finish`.
pub struct CbcEncryptingWriter<W: Write> {
    inner: W,
    encryptor: Aes256CbcEnc,
    buffer: Vec<u8>,
}

impl<W: Write> CbcEncryptingWriter<W> {
    pub fn new(inner: W, key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self {
            inner,
            encryptor: Aes256CbcEnc::new(key.into(), iv.into()),
            buffer: Vec::new(),
        }
    }
}

impl<W: Write> Write for CbcEncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> CbcEncryptingWriter<W> {
    /// Encrypt the accumulated plaintext with PKCS7 padding and flush it to
    /// the inner sink. Consumes `self` since CBC padding only applies once,
    /// at end of stream.
    pub fn finish(mut self) -> std::io::Result<W> {
        let ciphertext = self.encryptor.encrypt_padded_vec_mut::<Pkcs7>(&self.buffer);
        self.inner.write_all(&ciphertext)?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_round_trip_via_decrypt_matches_plaintext() {
        use aes::Aes256;
        use cbc::cipher::BlockDecryptMut;
        type Dec = cbc::Decryptor<Aes256>;

        let key = [7u8; 32];
        let iv = [3u8; 16];
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        let ciphertext = aes256_cbc_encrypt(&key, &iv, plaintext);

        let decryptor = Dec::new(&key.into(), &iv.into());
        let recovered = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn encrypt_for_recipients_rejects_empty_recipient_list() {
        let err = encrypt_for_recipients(b"data", &[]).unwrap_err();
        assert!(matches!(err, OrcError::Config { .. }));
    }
}
