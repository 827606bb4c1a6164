use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MenuCategory {
    Mixers,
    SoftBeverages,
    Chips,
    Eggs,
    Mains,
    Sandwiches,
    ColdBeverages,
    HotBeverages,
    Special,
}

impl MenuCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HotBeverages => "Tea & Coffee",
            Self::ColdBeverages => "Cold Drinks",
            Self::SoftBeverages => "Sodas",
            Self::Eggs => "Eggs",
            Self::Mains => "Parathas",
            Self::Sandwiches => "Sandwiches",
            Self::Chips => "Snacks",
            Self::Mixers => "Mixers",
            Self::Special => "Special Items",
        }
    }
}

/// A priced add-on the guest can pre-order with the stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: MenuCategory,
    /// Price in whole rupees
    pub price: Decimal,
}

impl MenuItem {
    fn new(id: &str, name: &str, category: MenuCategory, price: Decimal) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            price,
        }
    }
}

/// Authoritative add-on price table. Client-side prices are never trusted;
/// every server-side quote resolves items through this catalog.
#[derive(Debug, Clone)]
pub struct MenuCatalog {
    items: Vec<MenuItem>,
    index: HashMap<String, usize>,
}

impl MenuCatalog {
    pub fn new(items: Vec<MenuItem>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id.clone(), pos))
            .collect();
        Self { items, index }
    }

    /// The homestay's kitchen menu.
    pub fn standard() -> Self {
        use MenuCategory::*;

        Self::new(vec![
            MenuItem::new("red-bull", "Red Bull (250 ML)", Mixers, dec!(150)),
            MenuItem::new("schweppes-tonic", "Tonic Water (250 ML)", Mixers, dec!(80)),
            MenuItem::new("coke-thumbs-sprite", "Coke/Sprite/Thums Up", SoftBeverages, dec!(60)),
            MenuItem::new("pepsi", "Pepsi (250 ML)", SoftBeverages, dec!(60)),
            MenuItem::new("lays-chips", "Lays Chips (50g)", Chips, dec!(30)),
            MenuItem::new("masala-omelette", "Masala Omelette", Eggs, dec!(60)),
            MenuItem::new("bread-omelette", "Bread Omelette", Eggs, dec!(70)),
            MenuItem::new("poached-egg", "Poached Egg", Eggs, dec!(50)),
            MenuItem::new("boiled-egg", "Boiled Egg (2 pcs)", Eggs, dec!(40)),
            MenuItem::new("potato-paratha", "Potato Paratha", Mains, dec!(100)),
            MenuItem::new("onion-potato-paratha", "Onion Potato Paratha", Mains, dec!(100)),
            MenuItem::new("cheese-paratha", "Cheese Paratha", Mains, dec!(100)),
            MenuItem::new("cottage-cheese-paratha", "Cottage Cheese Paratha", Mains, dec!(100)),
            MenuItem::new("plain-paratha", "Plain Paratha", Mains, dec!(50)),
            MenuItem::new("cheese-sandwich", "Cheese Sandwich", Sandwiches, dec!(80)),
            MenuItem::new("veg-mayo-sandwich", "Veg Mayo Sandwich", Sandwiches, dec!(80)),
            MenuItem::new("potato-sandwich", "Potato Sandwich", Sandwiches, dec!(80)),
            MenuItem::new("lemon-soda", "Lemon Soda", ColdBeverages, dec!(80)),
            MenuItem::new("lemon-water", "Lemon Water", ColdBeverages, dec!(70)),
            MenuItem::new("lemon-iced-tea", "Lemon Iced Tea", ColdBeverages, dec!(100)),
            MenuItem::new("masala-tea", "Masala Tea", HotBeverages, dec!(50)),
            MenuItem::new("ginger-tea", "Ginger Tea", HotBeverages, dec!(50)),
            MenuItem::new("cardamom-tea", "Cardamom Tea", HotBeverages, dec!(50)),
            MenuItem::new("mutton-korma", "Mutton Korma", Special, dec!(1199)),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn price_of(&self, id: &str) -> Option<Decimal> {
        self.get(id).map(|item| item.price)
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn by_category(&self, category: MenuCategory) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(move |item| item.category == category)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for MenuCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_prices() {
        let catalog = MenuCatalog::standard();
        assert_eq!(catalog.len(), 24);
        assert_eq!(catalog.price_of("mutton-korma"), Some(dec!(1199)));
        assert_eq!(catalog.price_of("masala-tea"), Some(dec!(50)));
        assert_eq!(catalog.price_of("lays-chips"), Some(dec!(30)));
        assert_eq!(catalog.price_of("caviar"), None);
    }

    #[test]
    fn items_grouped_by_category() {
        let catalog = MenuCatalog::standard();
        let parathas: Vec<_> = catalog
            .by_category(MenuCategory::Mains)
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(parathas.len(), 5);
        assert!(parathas.contains(&"plain-paratha"));
        assert_eq!(MenuCategory::Mains.display_name(), "Parathas");
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&MenuCategory::HotBeverages).unwrap();
        assert_eq!(json, "\"hot-beverages\"");
    }
}
