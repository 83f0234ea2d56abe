//! Static term lists and the longest-first index the matchers scan.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::PiiCategory;

pub const DAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "mon", "tue",
    "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
];

/// "may" is only accepted as a month when its context reads like a date.
pub const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

pub const COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "blue", "purple", "pink", "black", "white", "gray", "grey",
    "brown", "gold", "silver", "violet", "indigo", "teal", "cyan", "magenta", "maroon", "navy",
    "beige", "tan", "coral", "turquoise", "lavender", "crimson", "amber", "aqua", "bronze",
    "burgundy", "charcoal", "chartreuse", "chocolate", "copper", "cream", "fuchsia", "ivory",
    "jade", "khaki", "lilac", "lime", "mauve", "olive", "peach", "periwinkle", "plum", "rose",
    "ruby", "salmon", "sapphire", "scarlet", "sienna", "slate", "taupe", "topaz", "vermillion",
];

pub const STATES: &[&str] = &[
    "alabama", "alaska", "arizona", "arkansas", "california", "colorado", "connecticut",
    "delaware", "florida", "georgia", "hawaii", "idaho", "illinois", "indiana", "iowa", "kansas",
    "kentucky", "louisiana", "maine", "maryland", "massachusetts", "michigan", "minnesota",
    "mississippi", "missouri", "montana", "nebraska", "nevada", "new hampshire", "new jersey",
    "new mexico", "new york", "north carolina", "north dakota", "ohio", "oklahoma", "oregon",
    "pennsylvania", "rhode island", "south carolina", "south dakota", "tennessee", "texas", "utah",
    "vermont", "virginia", "washington", "west virginia", "wisconsin", "wyoming",
    "district of columbia",
];

pub const CITIES_MULTI: &[&str] = &[
    "salt lake city", "new york city", "oklahoma city", "kansas city", "virginia beach",
    "new york", "los angeles", "san francisco", "san diego", "san antonio", "san jose",
    "las vegas", "fort worth", "el paso", "new orleans", "long beach", "colorado springs",
    "st louis", "st paul", "st petersburg", "santa fe", "santa ana", "santa monica",
    "baton rouge", "little rock", "grand rapids", "des moines", "ann arbor", "corpus christi",
    "round rock", "college station",
];

pub const CITIES_SINGLE: &[&str] = &[
    "houston", "phoenix", "philadelphia", "dallas", "austin", "jacksonville", "charlotte",
    "seattle", "denver", "boston", "detroit", "portland", "memphis", "baltimore", "milwaukee",
    "albuquerque", "tucson", "fresno", "sacramento", "atlanta", "miami", "oakland", "minneapolis",
    "cleveland", "tulsa", "pittsburgh", "cincinnati", "indianapolis", "nashville", "chicago",
    "omaha", "raleigh", "richmond", "buffalo", "orlando", "tampa", "honolulu", "anchorage",
    "arlington", "irving", "garland", "mesquite", "plano", "waco", "lubbock", "amarillo",
    "laredo", "midland", "odessa", "brownsville", "mcallen", "killeen", "pasadena", "beaumont",
    "abilene", "carrollton", "frisco", "lewisville", "denton", "richardson", "tyler", "pearland",
    "conroe", "edinburg", "burkburnett", "hilton", "lincoln", "savannah", "mobile",
    // Cities embedding a color name.
    "greenville", "greensboro", "brownwood", "blacksburg", "whitehall", "goldsboro",
    "silverdale", "bluefield", "redmond", "redding", "orangeburg", "pinkville",
];

pub fn terms_for(category: PiiCategory) -> Vec<&'static str> {
    match category {
        PiiCategory::Day => DAYS.to_vec(),
        PiiCategory::Month => MONTHS.to_vec(),
        PiiCategory::Color => COLORS.to_vec(),
        PiiCategory::State => STATES.to_vec(),
        PiiCategory::City => CITIES_MULTI
            .iter()
            .chain(CITIES_SINGLE.iter())
            .copied()
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconTerm {
    pub term: &'static str,
    pub category: PiiCategory,
    pub word_count: usize,
}

impl LexiconTerm {
    pub fn char_len(&self) -> usize {
        self.term.chars().count()
    }

    pub fn is_single_word(&self) -> bool {
        self.word_count == 1
    }
}

/// Read-only index over every category. Build once and share by reference.
#[derive(Debug)]
pub struct LexiconIndex {
    sorted_terms: Vec<LexiconTerm>,
    single_word_terms: HashSet<&'static str>,
}

impl LexiconIndex {
    pub fn build() -> Self {
        let mut sorted_terms: Vec<LexiconTerm> = PiiCategory::ALL
            .iter()
            .flat_map(|&category| {
                terms_for(category)
                    .into_iter()
                    .map(move |term| LexiconTerm {
                        term,
                        category,
                        word_count: term.split_whitespace().count(),
                    })
            })
            .collect();

        // Longest first, then alphabetical; identical surface forms fall back to
        // category priority so "new york" is a city before it is a state.
        sorted_terms.sort_by(|a, b| {
            b.char_len()
                .cmp(&a.char_len())
                .then_with(|| a.term.cmp(b.term))
                .then_with(|| a.category.priority().cmp(&b.category.priority()))
        });

        let single_word_terms = sorted_terms
            .iter()
            .filter(|t| t.is_single_word())
            .map(|t| t.term)
            .collect();

        Self {
            sorted_terms,
            single_word_terms,
        }
    }

    /// Process-wide shared instance.
    pub fn shared() -> &'static LexiconIndex {
        static INDEX: OnceLock<LexiconIndex> = OnceLock::new();
        INDEX.get_or_init(LexiconIndex::build)
    }

    pub fn sorted_terms(&self) -> &[LexiconTerm] {
        &self.sorted_terms
    }

    pub fn is_single_word_term(&self, term: &str) -> bool {
        self.single_word_terms.contains(term)
    }
}
