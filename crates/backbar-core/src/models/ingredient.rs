use serde::{Deserialize, Serialize};

/// Quantity of a full bottle. Entries without a stored quantity load as full.
pub const FULL_QUANTITY: f64 = 1.0;

/// Prefix of local ids for entries sourced from the remote pantry.
pub const REMOTE_ID_PREFIX: &str = "db_";

fn full_quantity() -> f64 {
    FULL_QUANTITY
}

/// Clamp a quantity to [0, 1] and round it to two decimals.
/// Non-finite input is treated as empty.
pub fn clamp_quantity(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Ingredient classification used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Spirit,
    Liqueur,
    Wine,
    Mixer,
    Juice,
    Syrup,
    Bitters,
    Garnish,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Spirit,
        Category::Liqueur,
        Category::Wine,
        Category::Mixer,
        Category::Juice,
        Category::Syrup,
        Category::Bitters,
        Category::Garnish,
        Category::Other,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Spirit => "Spirit",
            Category::Liqueur => "Liqueur",
            Category::Wine => "Wine",
            Category::Mixer => "Mixer",
            Category::Juice => "Juice",
            Category::Syrup => "Syrup",
            Category::Bitters => "Bitters",
            Category::Garnish => "Garnish",
            Category::Other => "Other",
        }
    }

    /// Next category in a filter cycle: None -> Spirit -> ... -> Other -> None.
    pub fn cycle(current: Option<Category>) -> Option<Category> {
        match current {
            None => Some(Category::ALL[0]),
            Some(c) => {
                let idx = Category::ALL.iter().position(|x| *x == c).unwrap_or(0);
                Category::ALL.get(idx + 1).copied()
            }
        }
    }
}

/// Which list a newly added ingredient lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetList {
    /// Owned bottles (the pantry)
    Cabinet,
    /// Shopping list
    Shopping,
}

/// A single ingredient in the user's cabinet or shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub wanted: bool,
    #[serde(default = "full_quantity")]
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<u32>,
}

impl IngredientEntry {
    /// Local id for an entry backed by remote pantry row `server_id`.
    pub fn remote_local_id(server_id: i64) -> String {
        format!("{}{}", REMOTE_ID_PREFIX, server_id)
    }

    /// Whether this entry's id was derived from a remote pantry row.
    pub fn is_remote_sourced(&self) -> bool {
        self.id.starts_with(REMOTE_ID_PREFIX)
    }

    /// Quantity as a whole percentage for display.
    pub fn quantity_percent(&self) -> u8 {
        (clamp_quantity(self.quantity) * 100.0).round() as u8
    }

    pub fn quantity_display(&self) -> String {
        match self.quantity_percent() {
            0 => "Empty".to_string(),
            100 => "Full".to_string(),
            p => format!("{}%", p),
        }
    }
}
