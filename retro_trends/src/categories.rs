const TEAM_KEYWORDS: &[&str] = &["team", "scrum", "org", "director"];
const AI_KEYWORDS: &[&str] = &["ai", "efficiency", "productivity"];
const PLANNING_KEYWORDS: &[&str] = &["planning", "commitment", "timeline"];
const SUPPORT_KEYWORDS: &[&str] = &["process", "support", "capacity", "jira"];
const CEREMONY_KEYWORDS: &[&str] = &["sprint", "standup", "retrospective", "ceremony"];
const DELIVERY_KEYWORDS: &[&str] = &[
    "process", "planning", "sprint", "capacity", "release", "jira", "timeline",
];

/// Groups questions by the keywords found in their text.
///
/// A question lands in every category whose keywords it mentions (lowercase
/// substring match), and in the fallback category if it mentions none.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Categorizer {
    categories: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl Categorizer {
    pub fn new(categories: &[(&str, &[&str])], fallback: &str) -> Categorizer {
        Categorizer {
            categories: categories
                .iter()
                .map(|(name, kws)| {
                    (
                        name.to_string(),
                        kws.iter().map(|k| k.to_lowercase()).collect(),
                    )
                })
                .collect(),
            fallback: fallback.to_string(),
        }
    }

    /// The three buckets of the question picker.
    pub fn compact() -> Categorizer {
        Categorizer::new(
            &[
                ("Team & Organization", TEAM_KEYWORDS),
                ("Process & Delivery", DELIVERY_KEYWORDS),
            ],
            "Other",
        )
    }

    /// The detailed grouping of the dashboard overview.
    pub fn detailed() -> Categorizer {
        Categorizer::new(
            &[
                ("Team & Organization", TEAM_KEYWORDS),
                ("AI & Efficiency", AI_KEYWORDS),
                ("Release Planning", PLANNING_KEYWORDS),
                ("Agile Ceremonies", CEREMONY_KEYWORDS),
                ("Process & Support", SUPPORT_KEYWORDS),
            ],
            "Other",
        )
    }

    /// The categories in declaration order, the fallback last. Questions keep their order.
    pub fn categorize(&self, questions: &[String]) -> Vec<(String, Vec<String>)> {
        let mut res: Vec<(String, Vec<String>)> = self
            .categories
            .iter()
            .map(|(name, _)| (name.clone(), Vec::new()))
            .collect();
        let mut other: Vec<String> = Vec::new();
        for q in questions {
            let lower = q.to_lowercase();
            let mut found = false;
            for (idx, (_, kws)) in self.categories.iter().enumerate() {
                if kws.iter().any(|k| lower.contains(k.as_str())) {
                    res[idx].1.push(q.clone());
                    found = true;
                }
            }
            if !found {
                other.push(q.clone());
            }
        }
        res.push((self.fallback.clone(), other));
        res
    }
}
