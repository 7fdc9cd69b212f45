use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification tag grouping skills for badges and missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Fitness,
    Squash,
    Recovery,
    Study,
    Creative,
}

impl SkillCategory {
    pub const ALL: &'static [Self] = &[
        Self::Fitness,
        Self::Squash,
        Self::Recovery,
        Self::Study,
        Self::Creative,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Fitness => "fitness",
            Self::Squash => "squash",
            Self::Recovery => "recovery",
            Self::Study => "study",
            Self::Creative => "creative",
        }
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: SkillCategory,
}

/// Seeded, append-only list of skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SkillCatalog(Vec<Skill>);

impl SkillCatalog {
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn from_skills(skills: Vec<Skill>) -> Self {
        let mut catalog = Self::empty();
        for skill in skills {
            catalog.insert(skill);
        }
        catalog
    }

    /// Add a skill unless one with the same name already exists.
    ///
    /// Returns `true` when the skill was added.
    pub fn insert(&mut self, skill: Skill) -> bool {
        if self.get(&skill.name).is_some() {
            return false;
        }
        self.0.push(skill);
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.0.iter().find(|skill| skill.name == name)
    }

    #[must_use]
    pub fn category_of(&self, name: &str) -> Option<SkillCategory> {
        self.get(name).map(|skill| skill.category)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Skill> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a SkillCatalog {
    type Item = &'a Skill;
    type IntoIter = std::slice::Iter<'a, Skill>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, category: SkillCategory) -> Skill {
        Skill {
            name: name.to_string(),
            category,
        }
    }

    #[test]
    fn insert_ignores_duplicate_names() {
        let mut catalog = SkillCatalog::from_skills(vec![
            skill("Piano", SkillCategory::Creative),
            skill("Piano", SkillCategory::Study),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.category_of("Piano"), Some(SkillCategory::Creative));
        assert!(catalog.insert(skill("Roadwork", SkillCategory::Fitness)));
        assert!(!catalog.insert(skill("Roadwork", SkillCategory::Fitness)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&SkillCategory::Creative).unwrap();
        assert_eq!(json, "\"creative\"");
        assert_eq!(SkillCategory::Study.to_string(), "study");
    }
}
