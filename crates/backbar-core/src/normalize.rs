//! Ingredient name normalization.
//!
//! Free-text names typed by the user or stored remotely are mapped to a
//! display name (what the cabinet shows) and a canonical name (stable key
//! used for images and matching). Common aliases collapse onto one display
//! name so "fresh lime juice" and "Lime Juice" reconcile as the same bottle.

/// Base URL for ingredient thumbnails
const IMAGE_BASE_URL: &str = "https://www.thecocktaildb.com/images/ingredients";

/// Known aliases, keyed by lowercased, whitespace-collapsed input.
const ALIASES: &[(&str, &str)] = &[
    ("fresh lime juice", "Lime Juice"),
    ("lime juice", "Lime Juice"),
    ("fresh lemon juice", "Lemon Juice"),
    ("lemon juice", "Lemon Juice"),
    ("simple", "Simple Syrup"),
    ("sugar syrup", "Simple Syrup"),
    ("angostura", "Angostura Bitters"),
    ("bitters", "Angostura Bitters"),
    ("bourbon whiskey", "Bourbon"),
    ("rye", "Rye Whiskey"),
    ("london dry gin", "Gin"),
    ("soda", "Soda Water"),
    ("club soda", "Soda Water"),
    ("cointreau", "Cointreau"),
    ("creme de cassis", "Crème de Cassis"),
    ("white rum", "Light Rum"),
    ("silver tequila", "Tequila"),
    ("blanco tequila", "Tequila"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub display_name: String,
    pub canonical_name: String,
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalize words typed entirely in lowercase; leave deliberate casing alone.
fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            if word.chars().any(char::is_uppercase) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a free-text ingredient name.
pub fn normalize_name(raw: &str) -> NormalizedName {
    let collapsed = collapse_whitespace(raw);
    let lookup = collapsed.to_lowercase();

    let display_name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == lookup)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| title_case(&collapsed));

    let canonical_name = display_name.to_lowercase();
    NormalizedName {
        display_name,
        canonical_name,
    }
}

/// Key used to match local entries against remote rows: the lowercased
/// normalized display name.
pub fn match_key(raw: &str) -> String {
    normalize_name(raw).display_name.to_lowercase()
}

/// Thumbnail URL for a canonical ingredient name.
pub fn image_url(canonical_name: &str) -> String {
    format!(
        "{}/{}-Small.png",
        IMAGE_BASE_URL,
        canonical_name.replace(' ', "%20")
    )
}
