//! Fixed semantic taxonomy.
//!
//! The language-model extractor may only emit entity and relation types from
//! this catalog; anything else is dropped during validation. The catalog is
//! grouped into eight knowledge domains so prompts can present it compactly.

use serde::Serialize;

/// One domain grouping of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxonomyDomain {
    pub name: &'static str,
    pub entity_types: &'static [&'static str],
}

const KNOWLEDGE_SYSTEMS: TaxonomyDomain = TaxonomyDomain {
    name: "Knowledge Systems",
    entity_types: &[
        "Encyclopedia",
        "Bibliography",
        "Library",
        "Archive",
        "Journal",
        "Magazine",
        "Newspaper",
        "Manuscript",
        "Database",
        "Catalog",
        "Museum",
        "Almanac",
        "Dictionary",
        "Index",
    ],
};

const PHILOSOPHY: TaxonomyDomain = TaxonomyDomain {
    name: "Philosophy & Psychology",
    entity_types: &[
        "Philosopher",
        "PhilosophicalSchool",
        "Concept",
        "Argument",
        "Ethics",
        "Logic",
        "Metaphysics",
        "Epistemology",
        "Aesthetics",
        "Psychologist",
        "CognitiveProcess",
        "Emotion",
        "MentalModel",
        "Paradox",
    ],
};

const RELIGION: TaxonomyDomain = TaxonomyDomain {
    name: "Religion",
    entity_types: &[
        "Religion",
        "Deity",
        "SacredText",
        "ReligiousFigure",
        "Denomination",
        "Ritual",
        "PlaceOfWorship",
        "Mythology",
        "ReligiousOrder",
        "Festival",
        "Doctrine",
        "Pilgrimage",
    ],
};

const SOCIAL_SCIENCES: TaxonomyDomain = TaxonomyDomain {
    name: "Social Sciences",
    entity_types: &[
        "Person",
        "Organization",
        "Institution",
        "Government",
        "PoliticalParty",
        "Law",
        "Treaty",
        "EconomicConcept",
        "Currency",
        "Market",
        "SocialMovement",
        "Community",
        "Profession",
        "EducationalInstitution",
        "Meeting",
        "Project",
    ],
};

const NATURAL_SCIENCES: TaxonomyDomain = TaxonomyDomain {
    name: "Natural Sciences & Mathematics",
    entity_types: &[
        "Scientist",
        "Theory",
        "Theorem",
        "Experiment",
        "ChemicalElement",
        "ChemicalCompound",
        "Organism",
        "Species",
        "Disease",
        "CelestialBody",
        "GeologicalFormation",
        "PhysicalConstant",
        "MathematicalConcept",
        "Unit",
        "NaturalPhenomenon",
    ],
};

const TECHNOLOGY: TaxonomyDomain = TaxonomyDomain {
    name: "Technology & Applied Sciences",
    entity_types: &[
        "Software",
        "ProgrammingLanguage",
        "Algorithm",
        "DataStructure",
        "Protocol",
        "Device",
        "Machine",
        "Material",
        "EngineeringDiscipline",
        "MedicalProcedure",
        "Drug",
        "Vehicle",
        "BuildingTechnique",
        "AgriculturalPractice",
        "Company",
        "Product",
    ],
};

const ARTS_HUMANITIES: TaxonomyDomain = TaxonomyDomain {
    name: "Arts & Humanities",
    entity_types: &[
        "Artist",
        "Author",
        "Book",
        "Poem",
        "Play",
        "Painting",
        "Sculpture",
        "MusicalWork",
        "Composer",
        "Film",
        "Genre",
        "LiteraryMovement",
        "Language",
        "ArchitecturalStyle",
        "Photograph",
        "Topic",
    ],
};

const HISTORY: TaxonomyDomain = TaxonomyDomain {
    name: "History & Geography",
    entity_types: &[
        "HistoricalEvent",
        "HistoricalPeriod",
        "War",
        "Battle",
        "Empire",
        "Dynasty",
        "Civilization",
        "Location",
        "Country",
        "City",
        "Region",
        "Landmark",
        "Expedition",
        "Artifact",
    ],
};

/// Relation types the extractor may assert between concepts.
pub const RELATION_TYPES: &[&str] = &[
    "MENTIONS",
    "RELATED_TO",
    "WORKS_FOR",
    "AUTHOR_OF",
    "PART_OF",
    "SIMILAR_TO",
    "COLLABORATES_WITH",
    "LOCATED_IN",
    "DISCUSSES",
    "ATTENDS",
];

/// The fixed entity/relation catalog handed to the language model.
#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    domains: &'static [TaxonomyDomain],
    relations: &'static [&'static str],
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

impl Taxonomy {
    /// The built-in eight-domain catalog.
    pub fn standard() -> Self {
        static DOMAINS: [TaxonomyDomain; 8] = [
            KNOWLEDGE_SYSTEMS,
            PHILOSOPHY,
            RELIGION,
            SOCIAL_SCIENCES,
            NATURAL_SCIENCES,
            TECHNOLOGY,
            ARTS_HUMANITIES,
            HISTORY,
        ];
        Self {
            domains: &DOMAINS,
            relations: RELATION_TYPES,
        }
    }

    pub fn domains(&self) -> &'static [TaxonomyDomain] {
        self.domains
    }

    /// Iterate every entity type across all domains.
    pub fn entity_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.domains
            .iter()
            .flat_map(|d| d.entity_types.iter().copied())
    }

    pub fn entity_type_count(&self) -> usize {
        self.domains.iter().map(|d| d.entity_types.len()).sum()
    }

    /// Case-insensitive membership check for an entity type.
    pub fn contains_entity_type(&self, candidate: &str) -> bool {
        self.entity_types()
            .any(|t| t.eq_ignore_ascii_case(candidate.trim()))
    }

    /// Case-insensitive membership check for a relation type.
    pub fn contains_relation(&self, candidate: &str) -> bool {
        self.relations
            .iter()
            .any(|r| r.eq_ignore_ascii_case(candidate.trim()))
    }

    /// Canonical spelling of an entity type, if it belongs to the catalog.
    pub fn canonical_entity_type(&self, candidate: &str) -> Option<&'static str> {
        self.entity_types()
            .find(|t| t.eq_ignore_ascii_case(candidate.trim()))
    }

    /// Canonical spelling of a relation type, if it belongs to the catalog.
    pub fn canonical_relation(&self, candidate: &str) -> Option<&'static str> {
        self.relations
            .iter()
            .copied()
            .find(|r| r.eq_ignore_ascii_case(candidate.trim()))
    }

    pub fn relations(&self) -> &'static [&'static str] {
        self.relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_exceeds_one_hundred_types() {
        let taxonomy = Taxonomy::standard();
        assert!(taxonomy.entity_type_count() >= 100);
        assert_eq!(taxonomy.domains().len(), 8);
    }

    #[test]
    fn entity_types_are_unique() {
        let taxonomy = Taxonomy::standard();
        let mut seen = std::collections::HashSet::new();
        for t in taxonomy.entity_types() {
            assert!(seen.insert(t), "duplicate entity type: {t}");
        }
    }

    #[test]
    fn membership_checks_are_case_insensitive() {
        let taxonomy = Taxonomy::standard();
        assert!(taxonomy.contains_entity_type("person"));
        assert!(taxonomy.contains_entity_type("  Software "));
        assert!(!taxonomy.contains_entity_type("Starship"));
        assert!(taxonomy.contains_relation("related_to"));
        assert!(!taxonomy.contains_relation("TELEPORTS_TO"));
    }

    #[test]
    fn canonicalization_restores_catalog_spelling() {
        let taxonomy = Taxonomy::standard();
        assert_eq!(taxonomy.canonical_entity_type("PERSON"), Some("Person"));
        assert_eq!(taxonomy.canonical_relation("mentions"), Some("MENTIONS"));
        assert_eq!(taxonomy.canonical_entity_type("nope"), None);
    }
}
