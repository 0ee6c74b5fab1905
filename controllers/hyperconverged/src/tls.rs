//! TLS profile derivation.
//!
//! The HyperConverged TLS security profile is passed through verbatim to
//! components that understand it and flattened into a minimum version plus
//! a cipher list for the ones that do not. Profiles name ciphers the OpenSSL
//! way; KubeVirt wants IANA names and the UI proxy wants suite numbers.

use hco_crds::{HyperConverged, TlsProfileType, TlsProtocolVersion, TlsSecurityProfile};

const MODERN_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
];

const INTERMEDIATE_CIPHERS: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "DHE-RSA-AES128-GCM-SHA256",
    "DHE-RSA-AES256-GCM-SHA384",
];

const OLD_EXTRA_CIPHERS: &[&str] = &[
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-RSA-AES128-SHA256",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-RSA-AES256-SHA384",
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-RSA-AES256-SHA",
    "DHE-RSA-AES128-SHA256",
    "DHE-RSA-AES256-SHA256",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA256",
    "AES256-SHA256",
    "AES128-SHA",
    "AES256-SHA",
    "DES-CBC3-SHA",
];

/// OpenSSL name, IANA name and suite number of every cipher a consumer
/// other than nginx can be configured with. The DHE suites have no entry.
const CIPHER_SUITES: &[(&str, &str, u16)] = &[
    ("TLS_AES_128_GCM_SHA256", "TLS_AES_128_GCM_SHA256", 0x1301),
    ("TLS_AES_256_GCM_SHA384", "TLS_AES_256_GCM_SHA384", 0x1302),
    ("TLS_CHACHA20_POLY1305_SHA256", "TLS_CHACHA20_POLY1305_SHA256", 0x1303),
    ("ECDHE-ECDSA-AES128-GCM-SHA256", "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", 0xc02b),
    ("ECDHE-RSA-AES128-GCM-SHA256", "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", 0xc02f),
    ("ECDHE-ECDSA-AES256-GCM-SHA384", "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", 0xc02c),
    ("ECDHE-RSA-AES256-GCM-SHA384", "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", 0xc030),
    ("ECDHE-ECDSA-CHACHA20-POLY1305", "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca9),
    ("ECDHE-RSA-CHACHA20-POLY1305", "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca8),
    ("ECDHE-ECDSA-AES128-SHA256", "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", 0xc023),
    ("ECDHE-RSA-AES128-SHA256", "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", 0xc027),
    ("AES128-GCM-SHA256", "TLS_RSA_WITH_AES_128_GCM_SHA256", 0x009c),
    ("AES256-GCM-SHA384", "TLS_RSA_WITH_AES_256_GCM_SHA384", 0x009d),
    ("AES128-SHA256", "TLS_RSA_WITH_AES_128_CBC_SHA256", 0x003c),
    ("ECDHE-ECDSA-AES128-SHA", "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", 0xc009),
    ("ECDHE-RSA-AES128-SHA", "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", 0xc013),
    ("ECDHE-ECDSA-AES256-SHA", "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", 0xc00a),
    ("ECDHE-RSA-AES256-SHA", "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", 0xc014),
    ("AES128-SHA", "TLS_RSA_WITH_AES_128_CBC_SHA", 0x002f),
    ("AES256-SHA", "TLS_RSA_WITH_AES_256_CBC_SHA", 0x0035),
    ("DES-CBC3-SHA", "TLS_RSA_WITH_3DES_EDE_CBC_SHA", 0x000a),
];

fn cipher_suite(openssl: &str) -> Option<&'static (&'static str, &'static str, u16)> {
    CIPHER_SUITES.iter().find(|(name, _, _)| *name == openssl)
}

/// IANA names of `openssl` ciphers, in order. Unknown names are dropped.
pub fn iana_cipher_suites(openssl: &[String]) -> Vec<String> {
    openssl
        .iter()
        .filter_map(|name| cipher_suite(name))
        .map(|(_, iana, _)| (*iana).to_string())
        .collect()
}

/// Suite numbers of `openssl` ciphers, in order. Unknown names are dropped.
pub fn cipher_suite_ids(openssl: &[String]) -> Vec<u16> {
    openssl
        .iter()
        .filter_map(|name| cipher_suite(name))
        .map(|(_, _, id)| *id)
        .collect()
}

/// The profile in effect: the one set on the HyperConverged resource, or Intermediate.
pub fn effective_profile(hc: &HyperConverged) -> TlsSecurityProfile {
    match &hc.spec.tls_security_profile {
        Some(p) if p.type_.is_some() => p.clone(),
        _ => TlsSecurityProfile::of_type(TlsProfileType::Intermediate),
    }
}

/// Minimum protocol version of a profile.
pub fn min_version(profile: &TlsSecurityProfile) -> TlsProtocolVersion {
    match profile.type_ {
        Some(TlsProfileType::Old) => TlsProtocolVersion::VersionTLS10,
        Some(TlsProfileType::Modern) => TlsProtocolVersion::VersionTLS13,
        Some(TlsProfileType::Custom) => profile
            .custom
            .as_ref()
            .map_or(TlsProtocolVersion::VersionTLS12, |c| c.min_tls_version),
        Some(TlsProfileType::Intermediate) | None => TlsProtocolVersion::VersionTLS12,
    }
}

/// OpenSSL-style cipher names of a profile.
pub fn ciphers(profile: &TlsSecurityProfile) -> Vec<String> {
    let names: Vec<&str> = match profile.type_ {
        Some(TlsProfileType::Old) => INTERMEDIATE_CIPHERS.iter().chain(OLD_EXTRA_CIPHERS).copied().collect(),
        Some(TlsProfileType::Modern) => MODERN_CIPHERS.to_vec(),
        Some(TlsProfileType::Custom) => {
            return profile.custom.as_ref().map(|c| c.ciphers.clone()).unwrap_or_default();
        }
        Some(TlsProfileType::Intermediate) | None => INTERMEDIATE_CIPHERS.to_vec(),
    };
    names.into_iter().map(str::to_string).collect()
}

/// Wire name, e.g. `VersionTLS12`.
pub fn version_name(version: TlsProtocolVersion) -> &'static str {
    match version {
        TlsProtocolVersion::VersionTLS10 => "VersionTLS10",
        TlsProtocolVersion::VersionTLS11 => "VersionTLS11",
        TlsProtocolVersion::VersionTLS12 => "VersionTLS12",
        TlsProtocolVersion::VersionTLS13 => "VersionTLS13",
    }
}

/// Numeric form used by the UI proxy's `--tls-min-version` flag.
pub fn version_ordinal(version: TlsProtocolVersion) -> u8 {
    match version {
        TlsProtocolVersion::VersionTLS10 => 0,
        TlsProtocolVersion::VersionTLS11 => 1,
        TlsProtocolVersion::VersionTLS12 => 2,
        TlsProtocolVersion::VersionTLS13 => 3,
    }
}

/// nginx `ssl_protocols` value: the minimum version and everything above it.
pub fn nginx_ssl_protocols(min: TlsProtocolVersion) -> String {
    [
        (TlsProtocolVersion::VersionTLS10, "TLSv1"),
        (TlsProtocolVersion::VersionTLS11, "TLSv1.1"),
        (TlsProtocolVersion::VersionTLS12, "TLSv1.2"),
        (TlsProtocolVersion::VersionTLS13, "TLSv1.3"),
    ]
    .iter()
    .filter(|(v, _)| *v >= min)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hco_crds::CustomTlsProfile;

    #[test]
    fn test_default_is_intermediate() {
        let hc = HyperConverged::new("hc", Default::default());
        let profile = effective_profile(&hc);
        assert_eq!(profile.type_, Some(TlsProfileType::Intermediate));
        assert_eq!(min_version(&profile), TlsProtocolVersion::VersionTLS12);
        assert_eq!(ciphers(&profile).len(), INTERMEDIATE_CIPHERS.len());
    }

    #[test]
    fn test_modern() {
        let profile = TlsSecurityProfile::of_type(TlsProfileType::Modern);
        let min = min_version(&profile);
        assert_eq!(version_ordinal(min), 3);
        assert_eq!(nginx_ssl_protocols(min), "TLSv1.3");
        assert_eq!(version_name(min), "VersionTLS13");
    }

    #[test]
    fn test_old() {
        let profile = TlsSecurityProfile::of_type(TlsProfileType::Old);
        assert_eq!(nginx_ssl_protocols(min_version(&profile)), "TLSv1 TLSv1.1 TLSv1.2 TLSv1.3");
        assert!(ciphers(&profile).contains(&"DES-CBC3-SHA".to_string()));
    }

    #[test]
    fn test_iana_names() {
        let intermediate = ciphers(&TlsSecurityProfile::of_type(TlsProfileType::Intermediate));
        let iana = iana_cipher_suites(&intermediate);

        assert_eq!(iana.len(), INTERMEDIATE_CIPHERS.len() - 2);
        assert_eq!(iana[0], "TLS_AES_128_GCM_SHA256");
        assert!(iana.contains(&"TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".to_string()));
        assert!(iana.contains(&"TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256".to_string()));
        assert!(iana.iter().all(|name| !name.contains('-')));
    }

    #[test]
    fn test_suite_ids() {
        let names = vec![
            "ECDHE-ECDSA-AES128-GCM-SHA256".to_string(),
            "DHE-RSA-AES128-GCM-SHA256".to_string(),
            "DES-CBC3-SHA".to_string(),
            "TLS_AES_128_GCM_SHA256".to_string(),
        ];
        assert_eq!(cipher_suite_ids(&names), vec![49195, 10, 4865]);
    }

    #[test]
    fn test_every_old_cipher_but_dhe_is_known() {
        let old = ciphers(&TlsSecurityProfile::of_type(TlsProfileType::Old));
        let unknown: Vec<_> = old.iter().filter(|c| cipher_suite(c).is_none()).collect();
        assert!(unknown.iter().all(|c| c.starts_with("DHE-")), "{unknown:?}");
    }

    #[test]
    fn test_custom() {
        let profile = TlsSecurityProfile {
            type_: Some(TlsProfileType::Custom),
            custom: Some(CustomTlsProfile {
                ciphers: vec!["ECDHE-RSA-AES128-GCM-SHA256".to_string()],
                min_tls_version: TlsProtocolVersion::VersionTLS11,
            }),
            ..Default::default()
        };
        assert_eq!(min_version(&profile), TlsProtocolVersion::VersionTLS11);
        assert_eq!(ciphers(&profile), vec!["ECDHE-RSA-AES128-GCM-SHA256"]);
        assert_eq!(nginx_ssl_protocols(min_version(&profile)), "TLSv1.1 TLSv1.2 TLSv1.3");
    }
}
