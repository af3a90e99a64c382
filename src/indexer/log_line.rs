/// One unified-logging line: `[uptime][level][tag,tag] message`.
///
/// Leading bracket groups are collected in order; the last one holds the tags and
/// the one before it the level, so an optional decoration such as the uptime in front
/// is ignored. A single group is taken as the level with no tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub level: &'a str,
    pub tags: Vec<&'a str>,
    pub message: &'a str,
    pub trimmed_message: &'a str,
}

impl<'a> LogLine<'a> {
    pub fn parse(content: &'a str) -> Self {
        let mut groups: Vec<&'a str> = Vec::new();
        let mut rest = content;
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                break;
            };
            groups.push(&stripped[..close]);
            rest = &stripped[close + 1..];
        }

        let (level, tags) = match groups.len() {
            0 => ("", Vec::new()),
            1 => (groups[0].trim(), Vec::new()),
            n => (
                groups[n - 2].trim(),
                groups[n - 1]
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect(),
            ),
        };

        Self {
            level,
            tags,
            message: rest,
            trimmed_message: rest.trim(),
        }
    }

    /// True when every wanted tag is present.
    pub fn contains_tags(&self, wanted: &[&str]) -> bool {
        wanted.iter().all(|w| self.tags.contains(w))
    }

    pub fn is_level(&self, level: &str) -> bool {
        self.level.eq_ignore_ascii_case(level)
    }
}
