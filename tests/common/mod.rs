//! Shared fixtures: an in-memory provider and freshly minted certificates.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gcp_ssl_exporter::gcp::{
    ComputeApi, DatabaseInstance, SqlAdminApi, SslCert, SslCertificate, TargetHttpsProxy,
};
use gcp_ssl_exporter::ApiError;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::{X509NameBuilder, X509};
use tracing_subscriber::fmt::MakeWriter;

pub const DAY: f64 = 86_400.0;

pub fn mint_pem_until(common_name: &str, not_after: &Asn1TimeRef) -> String {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
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

/// A certificate valid for `days` more days.
pub fn mint_pem(common_name: &str, days: u32) -> String {
    mint_pem_until(common_name, &Asn1Time::days_from_now(days).unwrap())
}

/// A certificate that expired in 1970.
pub fn mint_expired_pem(common_name: &str) -> String {
    mint_pem_until(common_name, &Asn1Time::from_unix(86_400).unwrap())
}

pub fn projects(names: &[&str]) -> Vec<String> {
    names.iter().map(|p| p.to_string()).collect()
}

pub fn cert_uri(project: &str, name: &str) -> String {
    format!(
        "https://www.googleapis.com/compute/v1/projects/{}/global/sslCertificates/{}",
        project, name
    )
}

/// In-memory stand-in for the Compute and Cloud SQL APIs.
#[derive(Default)]
pub struct FakeBackend {
    pub certificates: HashMap<String, Vec<SslCertificate>>,
    pub proxies: HashMap<String, Vec<TargetHttpsProxy>>,
    pub instances: HashMap<String, Vec<DatabaseInstance>>,
    pub sql_certs: HashMap<(String, String), Vec<SslCert>>,
    pub failing_project: Option<String>,
    pub failing_sql_project: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads certificates `names` to `project`, each valid for `days` days.
    pub fn with_compute_certs(mut self, project: &str, names: &[&str], days: u32) -> Self {
        let certs = self.certificates.entry(project.to_string()).or_default();
        for name in names {
            certs.push(SslCertificate {
                name: name.to_string(),
                certificate: mint_pem(name, days),
                self_link: Some(cert_uri(project, name)),
            });
        }
        self
    }

    pub fn with_raw_compute_cert(mut self, project: &str, name: &str, pem: &str) -> Self {
        self.certificates
            .entry(project.to_string())
            .or_default()
            .push(SslCertificate {
                name: name.to_string(),
                certificate: pem.to_string(),
                self_link: None,
            });
        self
    }

    pub fn with_proxy(mut self, project: &str, proxy: &str, cert_names: &[&str]) -> Self {
        self.proxies
            .entry(project.to_string())
            .or_default()
            .push(TargetHttpsProxy {
                name: proxy.to_string(),
                ssl_certificates: cert_names.iter().map(|c| cert_uri(project, c)).collect(),
            });
        self
    }

    pub fn with_sql_cert(mut self, project: &str, instance: &str, common_name: &str, days: u32) -> Self {
        let instances = self.instances.entry(project.to_string()).or_default();
        if !instances.iter().any(|i| i.name == instance) {
            instances.push(DatabaseInstance {
                name: instance.to_string(),
            });
        }
        self.sql_certs
            .entry((project.to_string(), instance.to_string()))
            .or_default()
            .push(SslCert {
                instance: instance.to_string(),
                common_name: common_name.to_string(),
                cert: mint_pem(common_name, days),
            });
        self
    }

    pub fn failing_on(mut self, project: &str) -> Self {
        self.failing_project = Some(project.to_string());
        self
    }

    /// Only the Cloud SQL calls for `project` fail.
    pub fn failing_sql_on(mut self, project: &str) -> Self {
        self.failing_sql_project = Some(project.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self, project: &str) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_project.as_deref() == Some(project) {
            return Err(ApiError::Status {
                status: 403,
                url: format!("fake://projects/{}", project),
                body: "permission denied".to_string(),
            });
        }
        Ok(())
    }
}

impl ComputeApi for FakeBackend {
    fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>, ApiError> {
        self.call(project)?;
        Ok(self.certificates.get(project).cloned().unwrap_or_default())
    }

    fn list_target_https_proxies(&self, project: &str) -> Result<Vec<TargetHttpsProxy>, ApiError> {
        self.call(project)?;
        Ok(self.proxies.get(project).cloned().unwrap_or_default())
    }

    fn get_ssl_certificate(&self, project: &str, name: &str) -> Result<SslCertificate, ApiError> {
        self.call(project)?;
        self.certificates
            .get(project)
            .and_then(|certs| certs.iter().find(|c| c.name == name))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                url: cert_uri(project, name),
                body: "not found".to_string(),
            })
    }
}

impl SqlAdminApi for FakeBackend {
    fn list_instances(&self, project: &str) -> Result<Vec<DatabaseInstance>, ApiError> {
        self.call(project)?;
        if self.failing_sql_project.as_deref() == Some(project) {
            return Err(ApiError::Status {
                status: 500,
                url: format!("fake://sql/projects/{}/instances", project),
                body: "backend error".to_string(),
            });
        }
        Ok(self.instances.get(project).cloned().unwrap_or_default())
    }

    fn list_ssl_certs(&self, project: &str, instance: &str) -> Result<Vec<SslCert>, ApiError> {
        self.call(project)?;
        Ok(self
            .sql_certs
            .get(&(project.to_string(), instance.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Log output written while a closure ran.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines logged at `level`, e.g. "ERROR" or "WARN".
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let marker = format!(" {} ", level);
        self.contents()
            .lines()
            .filter(|line| line.contains(&marker))
            .map(|line| line.to_string())
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber that records WARN and ERROR events.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
