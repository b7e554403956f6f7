use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for hunt
///
/// Every section has defaults, so an empty file (or no file at all) yields the
/// built-in source list and crawler limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub transport: TransportConfig,
    pub output: OutputConfig,
    pub engines: Vec<EngineEntry>,
    pub feeds: Vec<SourceEntry>,
    pub directories: Vec<SourceEntry>,
    pub seeds: Vec<SourceEntry>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    pub categories: Vec<CategoryEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers in the pool
    pub workers: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    pub min_domain_interval_ms: u64,

    /// Crawl depth used when the command line does not ask for one
    pub default_depth: u32,

    /// Upper bound for any requested crawl depth
    pub max_depth: u32,

    /// Number of buffered discoveries that triggers a store flush
    pub flush_threshold: usize,

    /// How long in-flight workers may run after cancellation (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 30,
            min_domain_interval_ms: 2000,
            default_depth: 1,
            max_depth: 3,
            flush_threshold: 20,
            shutdown_grace_ms: 5000,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TransportConfig {
    /// Proxy URL for all requests (e.g. a local Tor SOCKS port)
    pub proxy: Option<String>,

    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Lower bound of the random delay added before each request (milliseconds)
    pub jitter_min_ms: u64,

    /// Upper bound of the random delay added before each request (milliseconds)
    pub jitter_max_ms: u64,

    /// Pool of user agents, one picked at random per request
    pub user_agents: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy: Some("socks5h://127.0.0.1:9050".to_string()),
            connect_timeout_secs: 15,
            request_timeout_secs: 45,
            jitter_min_ms: 500,
            jitter_max_ms: 2500,
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; rv:109.0) Gecko/20100101 Firefox/115.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/115.0",
                "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:118.0) Gecko/20100101 Firefox/118.0",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite knowledge store
    pub database_path: String,

    /// CSV file that receives the newly inserted leads of every run
    pub leads_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "onion_knowledge_base.db".to_string(),
            leads_path: Some("darkweb_leads.csv".to_string()),
        }
    }
}

/// A query-driven search engine
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineEntry {
    pub name: String,

    /// Search endpoint; keywords are sent as a query parameter
    pub url: String,

    /// Name of the query parameter carrying the keyword
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// CSS selector for result anchors
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Additional fixed query parameters
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,

    /// Result hosts to drop besides the engine's own (mirrors of the engine)
    #[serde(default)]
    pub exclude_hosts: Vec<String>,
}

fn default_query_param() -> String {
    "q".to_string()
}

fn default_selector() -> String {
    "a[href]".to_string()
}

/// A named URL used by feed, directory and deep-crawl sources
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub url: String,
}

/// A classification category with its trigger keywords
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            transport: TransportConfig::default(),
            output: OutputConfig::default(),
            engines: default_engines(),
            feeds: numbered("Feed", DEFAULT_FEEDS),
            directories: numbered("Spider", DEFAULT_DIRECTORIES),
            seeds: numbered("DeepCrawler", DEFAULT_SEEDS),
            synonyms: default_synonyms(),
            categories: default_categories(),
        }
    }
}

fn engine(name: &str, url: &str, selector: &str, extra: &[(&str, &str)]) -> EngineEntry {
    EngineEntry {
        name: name.to_string(),
        url: url.to_string(),
        query_param: default_query_param(),
        selector: selector.to_string(),
        extra_params: extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        exclude_hosts: Vec::new(),
    }
}

const AHMIA_ONION_HOST: &str = "juhanurmihxlp77nkq76byazcldy2hlmovfu2epvl5ankdibsot4csyd.onion";

fn default_engines() -> Vec<EngineEntry> {
    vec![
        engine(
            "Ahmia_Onion",
            &format!("http://{}/search/", AHMIA_ONION_HOST),
            "a[href]",
            &[],
        ),
        EngineEntry {
            exclude_hosts: vec![AHMIA_ONION_HOST.to_string()],
            ..engine("Ahmia_Clear", "https://ahmia.fi/search/", "a[href]", &[])
        },
        engine(
            "DuckDuckGo_Onion",
            "https://duckduckgogg42xjoc72x3sjasowoarfbgcmvfima3ogsn36cyq6wiid.onion/html/",
            "a.result__url[href]",
            &[("kl", "wt-wt")],
        ),
        engine("OnionSearch", "https://onionsearch.org/search", "a[href]", &[]),
    ]
}

const DEFAULT_FEEDS: &[&str] = &[
    "https://raw.githubusercontent.com/nemo-nesciam/2024.onion.links/main/Hidden-Wiki.txt",
    "https://raw.githubusercontent.com/MTXPr0ject/Dark-Web-Links/refs/heads/main/README.md",
    "https://gist.githubusercontent.com/mvelazc0/23249033f99e691238d2/raw/hidden_services_urls.txt",
    "https://raw.githubusercontent.com/pali-justin/Dark-Web-Links/master/Dark-Web-Links.md",
    "https://raw.githubusercontent.com/billytheking/Onion-Links/master/links.txt",
    "https://raw.githubusercontent.com/v2ray/domain-list-community/master/data/onion",
    "https://raw.githubusercontent.com/not-not-evil/onion-links/main/links.txt",
    "https://raw.githubusercontent.com/alecmuffett/real-world-onion-sites/master/README.md",
    "https://raw.githubusercontent.com/S-9/Secret_Deep_Web_Links/master/Secret_Deep_Web_Links.md",
];

const DEFAULT_DIRECTORIES: &[&str] = &[
    "http://zqktlwiuavvvqqt4ybvgvi7tyo4hjl5xgfuvpdf6otj3cy6ih7eypbad.onion/wiki/Main_Page",
    "http://torlinksge6enmcyy.onion/",
    "http://dirnxxdraygbifgc.onion/",
];

const DEFAULT_SEEDS: &[&str] = &[
    "http://zqktlwiuavvvqqt4ybvgvi7tyo4hjl5xgfuvpdf6otj3cy6ih7eypbad.onion/wiki/Main_Page",
    "http://torlinksge6enmcyy.onion/",
    "http://dirnxxdraygbifgc.onion/",
];

fn numbered(prefix: &str, urls: &[&str]) -> Vec<SourceEntry> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| SourceEntry {
            name: format!("{}_{}", prefix, i + 1),
            url: url.to_string(),
        })
        .collect()
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    let weapons = &[
        "firearms", "guns", "pistol", "rifle", "munition", "armament", "оружие", "пистолет",
        "винтовка", "боеприпасы", "武器", "枪", "步枪", "弹药",
    ];

    let mut synonyms = BTreeMap::new();
    let mut armas = vec!["weapons".to_string()];
    armas.extend(to_strings(weapons));
    armas.extend(to_strings(&[
        "أسلحة", "مسدس", "بندقية", "ذخيرة", "armas de fuego", "pistola", "fusil", "munición",
        "armes", "pistolet", "munitions",
    ]));
    synonyms.insert("armas".to_string(), armas);

    let mut weapons_list = vec!["armas".to_string()];
    weapons_list.extend(to_strings(weapons));
    synonyms.insert("weapons".to_string(), weapons_list);

    synonyms.insert(
        "drugs".to_string(),
        to_strings(&[
            "drogas", "narcotics", "cannabis", "cocaine", "heroin", "pills", "наркотики", "毒品",
        ]),
    );
    synonyms.insert(
        "police".to_string(),
        to_strings(&[
            "policia",
            "law enforcement",
            "cop",
            "intel",
            "intelligence",
            "полиция",
            "警方",
        ]),
    );
    synonyms
}

fn default_categories() -> Vec<CategoryEntry> {
    let table: &[(&str, &[&str])] = &[
        (
            "Weapons",
            &[
                "arma", "gun", "weapon", "firearm", "ammo", "explosive", "balístico", "оружие",
                "武器", "أسلحة",
            ],
        ),
        (
            "Financial",
            &[
                "carding",
                "bitcoin",
                "wallet",
                "money",
                "paypal",
                "dump",
                "banco",
                "transferência",
                "money laundering",
            ],
        ),
        (
            "Narcotics",
            &[
                "drugs", "cannabis", "cocaine", "lsd", "mdma", "heroin", "opioid", "drogas",
                "farma", "наркотики", "毒品",
            ],
        ),
        (
            "OSINT Services",
            &["wiki", "directory", "search", "index", "links", "agregador"],
        ),
        (
            "Forums/Social",
            &["forum", "chat", "board", "community", "mail", "messaging", "social"],
        ),
        (
            "Security/Intel",
            &[
                "security",
                "privacy",
                "intel",
                "intelligence",
                "police",
                "hack",
                "leaked",
                "exploit",
                "полиция",
            ],
        ),
    ];

    table
        .iter()
        .map(|(name, keywords)| CategoryEntry {
            name: name.to_string(),
            keywords: to_strings(keywords),
        })
        .collect()
}
