//! Target framework priority tables.
//!
//! A package built for several runtimes ships one `lib/<tfm>/` folder per
//! target framework moniker. The consumer's compatibility level decides which
//! monikers it can load and in what order of preference:
//!
//! | profile          | groups, most preferred first                                       |
//! |------------------|--------------------------------------------------------------------|
//! | `netframework`   | net48..net4, netstandard2.1, netstandard2.0, netstandard1.x, net35-unity/net35/net20 |
//! | `netstandard2.1` | netstandard2.1, netstandard2.0, netstandard1.x                     |
//! | `netstandard2.0` | netstandard2.0, netstandard1.x                                     |
//! | `platform`       | the platform moniker, netstandard2.1, netstandard2.0, netstandard1.x |
//!
//! Under `netframework`, the platform version gates the newer monikers:
//! net471/net472 need at least 2019.1, net48 and netstandard2.1 need at
//! least 2021.2. A missing platform version means the newest tier.
//!
//! The rank of a moniker is `group * 1000 + index`; the lowest rank wins and
//! monikers that appear in no group are ineligible.

use serde::{Deserialize, Serialize};

use crate::package::FrameworkGroup;

/// Umbrella moniker whose sibling folders are kept together.
pub const UMBRELLA_FRAMEWORK: &str = "net35-unity";

const TIER_ONE: (u32, u32) = (2019, 1);
const TIER_TWO: (u32, u32) = (2021, 2);

const NETSTANDARD_1: &[&str] = &[
    "netstandard1.6",
    "netstandard1.5",
    "netstandard1.4",
    "netstandard1.3",
    "netstandard1.2",
    "netstandard1.1",
    "netstandard1.0",
];

const LEGACY_FRAMEWORKS: &[&str] =
    &["net35-unity full v3.5", "net35-unity subset v3.5", "net35", "net20", "net11"];

/// Runtime API surface the consuming project compiles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compatibility {
    /// .NET Standard 2.0
    #[default]
    #[serde(rename = "netstandard2.0")]
    NetStandard20,
    /// .NET Standard 2.1
    #[serde(rename = "netstandard2.1")]
    NetStandard21,
    /// Legacy .NET Framework 4.x
    #[serde(rename = "netframework")]
    NetFramework,
    /// A platform-specific moniker, then .NET Standard
    #[serde(rename = "platform")]
    Platform,
}

/// The consumer's framework settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkProfile {
    /// Compatibility level
    pub compatibility: Compatibility,
    /// Host platform version such as `2021.3`, gating newer monikers
    pub platform_version: Option<String>,
    /// Moniker preferred under [`Compatibility::Platform`]
    pub platform_moniker: Option<String>,
}

impl FrameworkProfile {
    /// A profile with no platform version or moniker.
    #[must_use]
    pub fn new(compatibility: Compatibility) -> Self {
        Self {
            compatibility,
            ..Self::default()
        }
    }

    /// Acceptable monikers, grouped and ordered by preference.
    #[must_use]
    pub fn priority_groups(&self) -> Vec<Vec<String>> {
        let owned = |names: &[&str]| names.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let tier = platform_tier(self.platform_version.as_deref());

        match self.compatibility {
            Compatibility::NetFramework => {
                let mut framework = Vec::new();
                if tier >= TIER_TWO {
                    framework.push("net48");
                }
                if tier >= TIER_ONE {
                    framework.extend(["net472", "net471"]);
                }
                framework.extend([
                    "net47", "net462", "net461", "net46", "net452", "net451", "net45", "net403",
                    "net40", "net4",
                ]);

                let mut groups = vec![owned(&framework)];
                if tier >= TIER_TWO {
                    groups.push(owned(&["netstandard2.1"]));
                }
                groups.push(owned(&["netstandard2.0"]));
                groups.push(owned(NETSTANDARD_1));
                groups.push(owned(LEGACY_FRAMEWORKS));
                groups
            }
            Compatibility::NetStandard21 => vec![
                owned(&["netstandard2.1"]),
                owned(&["netstandard2.0"]),
                owned(NETSTANDARD_1),
            ],
            Compatibility::NetStandard20 => vec![owned(&["netstandard2.0"]), owned(NETSTANDARD_1)],
            Compatibility::Platform => {
                let mut groups = Vec::new();
                if let Some(moniker) = &self.platform_moniker {
                    groups.push(vec![moniker.clone()]);
                }
                groups.push(owned(&["netstandard2.1"]));
                groups.push(owned(&["netstandard2.0"]));
                groups.push(owned(NETSTANDARD_1));
                groups
            }
        }
    }

    /// Rank of `tfm` (lower is better), or `None` when it is ineligible.
    #[must_use]
    pub fn rank(&self, tfm: &str) -> Option<usize> {
        let candidate = normalize_tfm(tfm);
        self.priority_groups().iter().enumerate().find_map(|(group, names)| {
            names
                .iter()
                .position(|name| tfm_matches(&candidate, &normalize_tfm(name)))
                .map(|index| group * 1000 + index)
        })
    }

    /// Which `lib/` folders to keep out of `folders`.
    ///
    /// A single folder is always kept. Otherwise the best-ranked folder wins,
    /// together with its siblings when it belongs to the umbrella moniker. An
    /// empty result means no folder is eligible.
    #[must_use]
    pub fn select_folders(&self, folders: &[String]) -> Vec<String> {
        if folders.len() == 1 {
            return folders.to_vec();
        }

        let Some(winner) = folders
            .iter()
            .filter_map(|f| self.rank(f).map(|rank| (rank, f)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, f)| f)
        else {
            return Vec::new();
        };

        if is_umbrella(winner) {
            folders.iter().filter(|f| is_umbrella(f)).cloned().collect()
        } else {
            vec![winner.clone()]
        }
    }

    /// The dependency group to install for this profile.
    ///
    /// Picks the best-ranked group, then the any-framework (empty moniker)
    /// group, then the only group if there is exactly one.
    #[must_use]
    pub fn select_dependency_group<'a>(
        &self,
        groups: &'a [FrameworkGroup],
    ) -> Option<&'a FrameworkGroup> {
        groups
            .iter()
            .filter_map(|g| self.rank(&g.target_framework).map(|rank| (rank, g)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, g)| g)
            .or_else(|| groups.iter().find(|g| g.target_framework.trim().is_empty()))
            .or_else(|| if groups.len() == 1 { groups.first() } else { None })
    }
}

/// Lower-cases a moniker and folds the long forms (`.NETFramework4.5`,
/// `.NETStandard2.0`) into short ones (`net45`, `netstandard2.0`).
#[must_use]
pub fn normalize_tfm(tfm: &str) -> String {
    let lower = tfm.trim().to_ascii_lowercase();
    if let Some(version) = lower.strip_prefix(".netframework") {
        return format!("net{}", version.replace('.', ""));
    }
    if let Some(version) = lower.strip_prefix(".netstandard") {
        return format!("netstandard{version}");
    }
    lower.trim_start_matches('.').to_string()
}

fn tfm_matches(candidate: &str, name: &str) -> bool {
    candidate == name || candidate.replace('.', "") == name.replace('.', "")
}

fn is_umbrella(tfm: &str) -> bool {
    normalize_tfm(tfm).starts_with(UMBRELLA_FRAMEWORK)
}

/// `(major, minor)` of a platform version like `2021.3.5f1`; missing means newest.
fn platform_tier(version: Option<&str>) -> (u32, u32) {
    let Some(version) = version else {
        return (u32::MAX, u32::MAX);
    };
    let mut numbers = version.split('.').map(|part| {
        part.chars().take_while(char::is_ascii_digit).collect::<String>().parse::<u32>().unwrap_or(0)
    });
    (numbers.next().unwrap_or(0), numbers.next().unwrap_or(0))
}
