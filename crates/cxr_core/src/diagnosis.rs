//! Diagnostic classes and per-class probability scores.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Diagnostic category predicted for a chest X-ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    /// No pathological finding.
    Normal,
    /// Viral pneumonia.
    ViralPneumonia,
    /// Bacterial pneumonia.
    BacterialPneumonia,
}

impl Diagnosis {
    /// Stable identifier used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ViralPneumonia => "viral_pneumonia",
            Self::BacterialPneumonia => "bacterial_pneumonia",
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered classes emitted by a classifier, with one designated no-finding class.
///
/// The order matches the model's logit order and doubles as the tie-break
/// priority: on equal probability the first-declared class wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClassSetRepr", into = "ClassSetRepr")]
pub struct ClassSet {
    classes: Vec<Diagnosis>,
    no_finding: Diagnosis,
}

#[derive(Serialize, Deserialize)]
struct ClassSetRepr {
    classes: Vec<Diagnosis>,
    no_finding: Diagnosis,
}

impl TryFrom<ClassSetRepr> for ClassSet {
    type Error = CoreError;

    fn try_from(repr: ClassSetRepr) -> Result<Self> {
        Self::new(repr.classes, repr.no_finding)
    }
}

impl From<ClassSet> for ClassSetRepr {
    fn from(set: ClassSet) -> Self {
        Self {
            classes: set.classes,
            no_finding: set.no_finding,
        }
    }
}

impl ClassSet {
    /// Create a class set.
    ///
    /// # Errors
    ///
    /// Fails if `no_finding` is not in `classes` or a class is repeated.
    pub fn new(classes: Vec<Diagnosis>, no_finding: Diagnosis) -> Result<Self> {
        for (i, class) in classes.iter().enumerate() {
            if classes[..i].contains(class) {
                return Err(CoreError::DuplicateClass(*class));
            }
        }
        if !classes.contains(&no_finding) {
            return Err(CoreError::MissingNoFinding(no_finding));
        }
        Ok(Self {
            classes,
            no_finding,
        })
    }

    /// Classes in model output order.
    #[must_use]
    pub fn classes(&self) -> &[Diagnosis] {
        &self.classes
    }

    /// The class for which no explanation is computed.
    #[must_use]
    pub const fn no_finding(&self) -> Diagnosis {
        self.no_finding
    }

    /// Whether `class` is the no-finding class.
    #[must_use]
    pub fn is_no_finding(&self, class: Diagnosis) -> bool {
        class == self.no_finding
    }

    /// Logit index of a class.
    #[must_use]
    pub fn index_of(&self, class: Diagnosis) -> Option<usize> {
        self.classes.iter().position(|&c| c == class)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the set is empty. Never true for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassSet {
    fn default() -> Self {
        Self {
            classes: vec![
                Diagnosis::BacterialPneumonia,
                Diagnosis::Normal,
                Diagnosis::ViralPneumonia,
            ],
            no_finding: Diagnosis::Normal,
        }
    }
}

/// Probability per class, in class-set order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    entries: Vec<(Diagnosis, f32)>,
}

impl ClassScores {
    /// Pair probabilities with the classes of `set`.
    ///
    /// # Errors
    ///
    /// Fails if the number of probabilities differs from the number of classes.
    pub fn new(set: &ClassSet, probabilities: &[f32]) -> Result<Self> {
        if probabilities.len() != set.len() {
            return Err(CoreError::ScoreCount {
                expected: set.len(),
                got: probabilities.len(),
            });
        }
        let entries = set
            .classes()
            .iter()
            .copied()
            .zip(probabilities.iter().copied())
            .collect();
        Ok(Self { entries })
    }

    /// Class with the highest probability; ties go to the first-declared class.
    #[must_use]
    pub fn argmax(&self) -> Diagnosis {
        let mut best = self.entries[0];
        for &(class, p) in &self.entries[1..] {
            if p > best.1 {
                best = (class, p);
            }
        }
        best.0
    }

    /// Probability of one class.
    #[must_use]
    pub fn get(&self, class: Diagnosis) -> Option<f32> {
        self.entries.iter().find(|(c, _)| *c == class).map(|&(_, p)| p)
    }

    /// Iterate `(class, probability)` pairs in class-set order.
    pub fn iter(&self) -> impl Iterator<Item = (Diagnosis, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Sum of all probabilities.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.entries.iter().map(|&(_, p)| p).sum()
    }
}

impl Serialize for ClassScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (class, p) in &self.entries {
            map.serialize_entry(class, p)?;
        }
        map.end()
    }
}
