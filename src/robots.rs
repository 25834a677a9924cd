use std::time::Duration;

use tracing::{info, warn};
use url::Url;

/// Parsed robots exclusion rules for one host.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

#[derive(Debug, Clone, Default)]
struct Group {
    /// Lowercased user-agent tokens this group applies to ("*" for all).
    agents: Vec<String>,
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut collecting_agents = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !collecting_agents && !current.agents.is_empty() {
                        groups.push(std::mem::take(&mut current));
                    }
                    current.agents.push(value.to_lowercase());
                    collecting_agents = true;
                }
                "disallow" => {
                    collecting_agents = false;
                    // an empty Disallow means "allow everything"
                    if !value.is_empty() {
                        current.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    collecting_agents = false;
                    if !value.is_empty() {
                        current.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    current.crawl_delay = value.parse::<f64>().ok();
                }
                _ => {
                    collecting_agents = false;
                }
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// Whether `path` may be fetched by `user_agent`. The longest matching
    /// rule wins; on equal length, Allow beats Disallow. No matching group
    /// (or no robots.txt at all) allows everything.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let longest = |rules: &[String]| {
            rules
                .iter()
                .filter(|p| path.starts_with(p.as_str()))
                .map(|p| p.len())
                .max()
        };
        match (longest(&group.allow), longest(&group.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(d)) => a >= d,
        }
    }

    /// Crawl-delay of the matched group, if any.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)?
            .crawl_delay
            .map(Duration::from_secs_f64)
    }

    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }
}

/// Fetch and parse `/robots.txt` for the seed's host. A missing file or an
/// unreachable server yields empty rules (allow everything) rather than
/// blocking the crawl.
pub async fn fetch(client: &reqwest::Client, seed: &Url) -> RobotsRules {
    let mut robots_url = seed.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    match client.get(robots_url.clone()).send().await {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(text) => {
                info!("loaded robots.txt from {}", robots_url);
                RobotsRules::parse(&text)
            }
            Err(e) => {
                warn!("failed to read robots.txt body: {}", e);
                RobotsRules::default()
            }
        },
        Ok(resp) => {
            info!("no robots.txt ({} from {})", resp.status(), robots_url);
            RobotsRules::default()
        }
        Err(e) => {
            warn!("robots.txt fetch failed, allowing all: {}", e);
            RobotsRules::default()
        }
    }
}

// ── Tests ──
