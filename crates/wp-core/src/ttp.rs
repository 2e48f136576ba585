//! Keyword-based ATT&CK technique matching.
//!
//! A deliberately simple matcher: case-insensitive substring lookup against
//! a fixed keyword table. The table is immutable configuration injected at
//! construction so tests can substitute their own.

use std::collections::BTreeSet;

/// Maps free text to ATT&CK technique tags via keyword lookup.
#[derive(Debug, Clone)]
pub struct TtpMatcher {
    keywords: Vec<(String, Vec<String>)>,
}

impl TtpMatcher {
    /// Creates a matcher from an explicit keyword table.
    pub fn new<K, T>(table: impl IntoIterator<Item = (K, Vec<T>)>) -> Self
    where
        K: Into<String>,
        T: Into<String>,
    {
        Self {
            keywords: table
                .into_iter()
                .map(|(k, ts)| {
                    (
                        k.into().to_lowercase(),
                        ts.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Returns every technique whose keyword occurs in `text`.
    ///
    /// Matching is case-insensitive substring containment; the result is a
    /// sorted set, so repeated keyword hits collapse.
    pub fn matches(&self, text: &str) -> BTreeSet<String> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|(keyword, _)| text.contains(keyword.as_str()))
            .flat_map(|(_, techniques)| techniques.iter().cloned())
            .collect()
    }
}

impl Default for TtpMatcher {
    /// The production keyword table.
    fn default() -> Self {
        let t: &[(&str, &[&str])] = &[
            // Initial Access
            ("brute", &["T1110"]),
            ("bruteforce", &["T1110"]),
            ("password spray", &["T1110"]),
            ("exploit", &["T1190", "T1210", "T1211"]),
            ("vulnerability", &["T1190"]),
            ("cve", &["T1190"]),
            ("phishing", &["T1566"]),
            ("spear phishing", &["T1566.001", "T1566.002", "T1566.003"]),
            ("malware", &["T1204", "T1204.001", "T1204.002", "T1204.003"]),
            ("ransomware", &["T1486"]),
            ("trojan", &["T1204.002"]),
            // Discovery & Reconnaissance
            ("scan", &["T1046", "T1190", "T1595"]),
            ("scanning", &["T1046", "T1190", "T1595"]),
            ("port scan", &["T1046"]),
            ("network scan", &["T1046", "T1595.001"]),
            ("recon", &["T1595"]),
            ("reconnaissance", &["T1595"]),
            ("enumeration", &["T1087", "T1069", "T1018", "T1046"]),
            ("host discovery", &["T1018"]),
            ("service discovery", &["T1046"]),
            // Command and Control
            ("c2", &["T1071", "T1090", "T1095", "T1105"]),
            ("command and control", &["T1071", "T1090", "T1095", "T1105"]),
            ("beacon", &["T1071"]),
            ("dns", &["T1071.004", "T1090.004"]),
            ("http", &["T1071.001"]),
            ("https", &["T1071.001"]),
            ("web shell", &["T1505.003"]),
            ("reverse shell", &["T1059.003", "T1105"]),
            // Persistence
            ("persistence", &["T1136", "T1547", "T1053", "T1505"]),
            ("backdoor", &["T1505", "T1136"]),
            ("scheduled task", &["T1053", "T1053.005"]),
            ("cron", &["T1053.003"]),
            ("startup", &["T1547"]),
            // Lateral Movement
            ("lateral", &["T1021", "T1550"]),
            ("psexec", &["T1021.002"]),
            ("winrm", &["T1021.006"]),
            ("ssh", &["T1021.004"]),
            ("rdp", &["T1021.001"]),
            ("smb", &["T1021.002"]),
            ("wmi", &["T1047"]),
            ("pass the hash", &["T1550.002"]),
            ("pass the ticket", &["T1550.003"]),
            // Credential Access
            ("credential", &["T1110", "T1003", "T1555", "T1552"]),
            ("password", &["T1110", "T1003", "T1555"]),
            ("hash", &["T1003", "T1550.002"]),
            ("kerberoast", &["T1558.003"]),
            ("asreproast", &["T1558.004"]),
            ("lsass", &["T1003.001"]),
            ("keylogger", &["T1056.001"]),
            // Defense Evasion
            ("evasion", &["T1027", "T1036", "T1112", "T1140"]),
            ("obfuscation", &["T1027", "T1140"]),
            ("encoding", &["T1132", "T1140"]),
            ("encryption", &["T1027", "T1573"]),
            ("bypass", &["T1218", "T1553", "T1562"]),
            ("disable", &["T1562", "T1562.001"]),
            ("uac", &["T1548.002"]),
            ("amsi", &["T1562.001"]),
            // Collection & Exfiltration
            ("exfil", &["T1041", "T1048", "T1020"]),
            ("exfiltration", &["T1041", "T1048", "T1020"]),
            ("data theft", &["T1041", "T1114", "T1115"]),
            ("upload", &["T1105"]),
            ("download", &["T1105"]),
            ("compress", &["T1560"]),
            ("archive", &["T1560"]),
            ("zip", &["T1560.001"]),
            // Impact
            ("destruction", &["T1485", "T1489"]),
            ("wipe", &["T1485"]),
            ("delete", &["T1485"]),
            ("encrypt", &["T1486"]),
            ("deface", &["T1491"]),
            ("resource hijack", &["T1496"]),
            // Specific protocols & services
            ("ldap", &["T1087.002"]),
            ("active directory", &["T1087.002", "T1482", "T1069.002"]),
            ("kerberos", &["T1558", "T1558.001", "T1558.002", "T1558.003"]),
            ("ntlm", &["T1552.004"]),
            ("ftp", &["T1071.002"]),
            ("smtp", &["T1071.003"]),
            ("icmp", &["T1095"]),
            ("tcp", &["T1071"]),
            ("udp", &["T1071"]),
            // Specific tools & techniques
            ("metasploit", &["T1588.001"]),
            ("cobalt strike", &["T1588.001"]),
            ("mimikatz", &["T1003.001"]),
            ("bloodhound", &["T1595.001"]),
            ("responder", &["T1557.001"]),
            ("empire", &["T1588.001"]),
            ("powershell", &["T1059.001"]),
            ("cmd", &["T1059.003"]),
            ("python", &["T1059.006"]),
            // Network-based indicators
            ("tor", &["T1090.003", "T1188"]),
            ("proxy", &["T1090", "T1188"]),
            ("vpn", &["T1090.002"]),
            ("tunnel", &["T1572"]),
            ("domain fronting", &["T1090.004"]),
            // System artifacts
            ("registry", &["T1112", "T1547.001"]),
            ("process injection", &["T1055"]),
            ("dll injection", &["T1055.001"]),
            ("code signing", &["T1553.002"]),
            ("certificate", &["T1588.003"]),
        ];
        Self::new(
            t.iter()
                .map(|(k, ts)| (k.to_string(), ts.iter().map(|s| s.to_string()).collect())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let matcher = TtpMatcher::default();
        let ttps = matcher.matches("Detected BRUTE force against login portal");
        assert!(ttps.contains("T1110"));
    }

    #[test]
    fn test_multiple_keywords_union() {
        let matcher = TtpMatcher::default();
        let ttps = matcher.matches("port scan followed by rdp brute force");
        assert!(ttps.contains("T1046"));
        assert!(ttps.contains("T1021.001"));
        assert!(ttps.contains("T1110"));
    }

    #[test]
    fn test_duplicate_hits_collapse() {
        let matcher = TtpMatcher::new([("scan", vec!["T1046"]), ("scanning", vec!["T1046"])]);
        let ttps = matcher.matches("scanning activity");
        assert_eq!(ttps.len(), 1);
    }

    #[test]
    fn test_no_match_yields_empty_set() {
        let matcher = TtpMatcher::default();
        assert!(matcher.matches("routine heartbeat").is_empty());
    }

    #[test]
    fn test_substituted_table() {
        let matcher = TtpMatcher::new([("custom", vec!["T9999"])]);
        assert!(matcher.matches("custom signal").contains("T9999"));
        assert!(matcher.matches("brute force").is_empty());
    }
}
