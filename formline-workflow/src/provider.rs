//! Well-known mail providers and e-mail domain detection.

use core::fmt::{self, Display};

use phf::phf_map;

/// Canned SMTP settings for a mail provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: &'static str,
    pub host: &'static str,
    pub port: u16,
    pub secure: bool,
    /// Shown next to the credential field.
    pub hint: &'static str,
}

const GMAIL: ProviderProfile = ProviderProfile {
    name: "Gmail",
    host: "smtp.gmail.com",
    port: 587,
    secure: true,
    hint: "Gmail needs an App Password when 2-Step Verification is on. \
           Create one at myaccount.google.com/apppasswords and paste it here.",
};

const OUTLOOK: ProviderProfile = ProviderProfile {
    name: "Outlook",
    host: "smtp-mail.outlook.com",
    port: 587,
    secure: true,
    hint: "Use your Microsoft account password, or an app password if two-step verification is on.",
};

const YAHOO: ProviderProfile = ProviderProfile {
    name: "Yahoo Mail",
    host: "smtp.mail.yahoo.com",
    port: 465,
    secure: true,
    hint: "Yahoo Mail needs an app password generated under Account Security.",
};

const ICLOUD: ProviderProfile = ProviderProfile {
    name: "iCloud Mail",
    host: "smtp.mail.me.com",
    port: 587,
    secure: true,
    hint: "iCloud Mail needs an app-specific password from appleid.apple.com.",
};

const AOL: ProviderProfile = ProviderProfile {
    name: "AOL Mail",
    host: "smtp.aol.com",
    port: 465,
    secure: true,
    hint: "AOL Mail needs an app password generated under Account Security.",
};

const ZOHO: ProviderProfile = ProviderProfile {
    name: "Zoho Mail",
    host: "smtp.zoho.com",
    port: 465,
    secure: true,
    hint: "Use an application-specific password if two-factor authentication is on.",
};

const FASTMAIL: ProviderProfile = ProviderProfile {
    name: "Fastmail",
    host: "smtp.fastmail.com",
    port: 465,
    secure: true,
    hint: "Fastmail needs an app password with SMTP access.",
};

const GMX: ProviderProfile = ProviderProfile {
    name: "GMX",
    host: "mail.gmx.com",
    port: 587,
    secure: true,
    hint: "Enable POP3/IMAP access in your GMX settings before sending.",
};

const YANDEX: ProviderProfile = ProviderProfile {
    name: "Yandex Mail",
    host: "smtp.yandex.com",
    port: 465,
    secure: true,
    hint: "Yandex Mail needs an app password for mail clients.",
};

/// Lower-case domain to profile. Exact matches only.
static PROFILES: phf::Map<&'static str, ProviderProfile> = phf_map! {
    "gmail.com" => GMAIL,
    "googlemail.com" => GMAIL,
    "outlook.com" => OUTLOOK,
    "hotmail.com" => OUTLOOK,
    "live.com" => OUTLOOK,
    "msn.com" => OUTLOOK,
    "yahoo.com" => YAHOO,
    "ymail.com" => YAHOO,
    "icloud.com" => ICLOUD,
    "me.com" => ICLOUD,
    "mac.com" => ICLOUD,
    "aol.com" => AOL,
    "zoho.com" => ZOHO,
    "fastmail.com" => FASTMAIL,
    "gmx.com" => GMX,
    "yandex.com" => YANDEX,
};

/// The domain part of an e-mail address: everything after the last `@`,
/// trimmed and lower-cased.
///
/// Returns `None` when there is no `@` or nothing follows it.
#[must_use]
pub fn extract_domain(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    let domain = domain.trim();

    if domain.is_empty() {
        None
    } else {
        Some(domain.to_lowercase())
    }
}

/// Profile for an already extracted domain. Case-insensitive.
#[must_use]
pub fn lookup(domain: &str) -> Option<&'static ProviderProfile> {
    PROFILES.get(domain.to_lowercase().as_str())
}

/// Every known domain, unordered.
pub fn known_domains() -> impl Iterator<Item = &'static str> {
    PROFILES.keys().copied()
}

/// Result of running detection over an e-mail value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Detection {
    /// No usable domain in the address.
    #[default]
    NoDomain,

    /// The domain belongs to a known provider.
    Matched {
        domain: String,
        profile: &'static ProviderProfile,
    },

    /// A domain we have no profile for.
    Unknown { domain: String },
}

impl Detection {
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::NoDomain => None,
            Self::Matched { domain, .. } | Self::Unknown { domain } => Some(domain),
        }
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&'static ProviderProfile> {
        match self {
            Self::Matched { profile, .. } => Some(*profile),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

impl Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDomain => f.write_str("no domain"),
            Self::Matched { domain, profile } => write!(
                f,
                "{domain}: {} ({}:{})",
                profile.name, profile.host, profile.port
            ),
            Self::Unknown { domain } => write!(f, "{domain}: unknown provider"),
        }
    }
}

/// Detect the provider for an e-mail address.
#[must_use]
pub fn detect(email: &str) -> Detection {
    let Some(domain) = extract_domain(email) else {
        return Detection::NoDomain;
    };

    match lookup(&domain) {
        Some(profile) => Detection::Matched { domain, profile },
        None => Detection::Unknown { domain },
    }
}
