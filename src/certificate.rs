//! Decoding of provider-supplied PEM chains into the leaf X.509 certificate.
//!
//! Providers hand certificates back as one string holding one or more
//! concatenated PEM blocks, leaf first. Only the leaf is kept: the exporter
//! reports when the served certificate expires, not its issuers.

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::X509;

use crate::error::{ExporterError, Result};

const SECONDS_PER_DAY: i64 = 86_400;
const PEM_END_MARKER: &str = "-----END ";

/// The first certificate of a decoded PEM chain.
#[derive(Debug, Clone)]
pub struct LeafCertificate {
    cert: X509,
    chain_len: usize,
}

impl LeafCertificate {
    /// Absolute expiry instant (`notAfter`, UTC).
    pub fn not_after(&self) -> &Asn1TimeRef {
        self.cert.not_after()
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn not_after_unix(&self) -> Result<i64> {
        let epoch = Asn1Time::from_unix(0)?;
        seconds_between(&epoch, self.not_after())
    }

    /// Subject common name, when the certificate carries one.
    pub fn common_name(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|cn| cn.to_string())
    }

    /// Number of certificates that were decoded from the chain, leaf included.
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    /// Seconds from now until `notAfter`. Negative once expired.
    pub fn seconds_to_expire(&self) -> Result<f64> {
        let now = Asn1Time::days_from_now(0)?;
        self.seconds_to_expire_from(&now)
    }

    /// Seconds from `now` until `notAfter`.
    pub fn seconds_to_expire_from(&self, now: &Asn1TimeRef) -> Result<f64> {
        Ok(seconds_between(now, self.not_after())? as f64)
    }

    /// The underlying OpenSSL certificate.
    pub fn x509(&self) -> &X509 {
        &self.cert
    }
}

/// Parses a PEM chain and returns its leaf certificate.
///
/// # Errors
///
/// * [`ExporterError::MalformedInput`] when the input is empty, holds no PEM
///   block, holds a block with a corrupt body, or has non-PEM data after the
///   last block.
/// * [`ExporterError::CertificateParse`] when a decoded block is not a DER
///   encoded X.509 certificate.
pub fn parse_leaf_certificate(raw: &str) -> Result<LeafCertificate> {
    if raw.trim().is_empty() {
        return Err(ExporterError::MalformedInput {
            reason: "empty input".to_string(),
        });
    }

    let blocks = pem::parse_many(raw)?;
    if blocks.is_empty() {
        return Err(ExporterError::MalformedInput {
            reason: "no PEM block found".to_string(),
        });
    }
    check_no_trailing_data(raw)?;

    let mut chain = blocks
        .iter()
        .map(|block| X509::from_der(block.contents()).map_err(ExporterError::from))
        .collect::<Result<Vec<X509>>>()?;
    let chain_len = chain.len();

    // parse_many returned at least one block, so the chain is non-empty
    let cert = chain.swap_remove(0);
    Ok(LeafCertificate { cert, chain_len })
}

// Whatever follows the last END line has to be blank, otherwise another
// block was expected and could not be decoded.
fn check_no_trailing_data(raw: &str) -> Result<()> {
    let Some(end) = raw.rfind(PEM_END_MARKER) else {
        return Ok(());
    };
    let tail = match raw[end..].find('\n') {
        Some(newline) => &raw[end + newline..],
        None => "",
    };
    if tail.trim().is_empty() {
        Ok(())
    } else {
        Err(ExporterError::MalformedInput {
            reason: "unparseable data after the last PEM block".to_string(),
        })
    }
}

fn seconds_between(from: &Asn1TimeRef, to: &Asn1TimeRef) -> Result<i64> {
    let diff = from.diff(to)?;
    Ok(i64::from(diff.days) * SECONDS_PER_DAY + i64::from(diff.secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::x509::X509NameBuilder;

    fn mint_pem(common_name: &str, not_after: &Asn1TimeRef) -> String {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)
            .unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(0).unwrap())
            .unwrap();
        builder.set_not_after(not_after).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_single_certificate() {
        let not_after = Asn1Time::days_from_now(10).unwrap();
        let pem = mint_pem("www.example.com", &not_after);

        let leaf = parse_leaf_certificate(&pem).unwrap();
        assert_eq!(leaf.common_name(), Some("www.example.com".to_string()));
        assert_eq!(leaf.chain_len(), 1);

        let seconds = leaf.seconds_to_expire().unwrap();
        assert!((seconds - 10.0 * 86_400.0).abs() < 120.0, "{}", seconds);
    }

    #[test]
    fn test_chain_returns_leaf_not_issuer() {
        let leaf_pem = mint_pem("leaf", &Asn1Time::days_from_now(5).unwrap());
        let ca_pem = mint_pem("intermediate", &Asn1Time::days_from_now(900).unwrap());
        let chain = format!("{}{}", leaf_pem, ca_pem);

        let leaf = parse_leaf_certificate(&chain).unwrap();
        assert_eq!(leaf.common_name(), Some("leaf".to_string()));
        assert_eq!(leaf.chain_len(), 2);
        assert!(leaf.seconds_to_expire().unwrap() < 6.0 * 86_400.0);
    }

    #[test]
    fn test_expired_certificate_is_negative() {
        let pem = mint_pem("old", &Asn1Time::from_unix(86_400).unwrap());
        let leaf = parse_leaf_certificate(&pem).unwrap();

        assert_eq!(leaf.not_after_unix().unwrap(), 86_400);
        assert!(leaf.seconds_to_expire().unwrap() < 0.0);
    }

    #[test]
    fn test_seconds_to_expire_from_fixed_instant() {
        let pem = mint_pem("fixed", &Asn1Time::from_unix(1_000_000).unwrap());
        let leaf = parse_leaf_certificate(&pem).unwrap();

        let now = Asn1Time::from_unix(999_000).unwrap();
        assert_eq!(leaf.seconds_to_expire_from(&now).unwrap(), 1_000.0);

        let now = Asn1Time::from_unix(1_000_000).unwrap();
        assert_eq!(leaf.seconds_to_expire_from(&now).unwrap(), 0.0);
    }

    #[test]
    fn test_trailing_blank_lines_are_tolerated() {
        let pem = mint_pem("padded", &Asn1Time::days_from_now(1).unwrap());
        let padded = format!("{}\n\n  \n", pem);
        assert!(parse_leaf_certificate(&padded).is_ok());
    }

    #[test]
    fn test_empty_input_is_malformed() {
        for input in ["", "   ", "\n"] {
            match parse_leaf_certificate(input) {
                Err(ExporterError::MalformedInput { .. }) => {}
                other => panic!("Expected MalformedInput, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_garbage_input_is_malformed() {
        match parse_leaf_certificate("this is not a certificate") {
            Err(ExporterError::MalformedInput { .. }) => {}
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_garbage_is_malformed() {
        let pem = mint_pem("x", &Asn1Time::days_from_now(1).unwrap());
        let input = format!("{}garbage after the block\n", pem);
        match parse_leaf_certificate(&input) {
            Err(ExporterError::MalformedInput { .. }) => {}
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_non_certificate_block_fails_to_parse() {
        let input = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        match parse_leaf_certificate(input) {
            Err(ExporterError::CertificateParse { .. }) => {}
            other => panic!("Expected CertificateParse, got {:?}", other),
        }
    }
}
