//! Static catalog of purchasable credit packages.
//!
//! Loaded at startup; there is no dynamic pricing. Prices are BRL minor units
//! (centavos).

use serde::Serialize;

/// Predefined credit package for purchase.
#[derive(Debug, Clone, Serialize)]
pub struct CreditPackage {
    /// Package identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Marketing description.
    pub description: &'static str,
    /// Price in BRL cents.
    pub price_cents: u32,
    /// Credits granted upon purchase.
    pub credits: u32,
    /// Highlighted in the pricing UI.
    pub popular: bool,
}

/// Available credit packages.
pub const PACKAGES: &[CreditPackage] = &[
    CreditPackage {
        id: "starter-pack",
        name: "Pacote Starter",
        description: "20 créditos = 400 mensagens (20 por crédito)",
        price_cents: 2_490,
        credits: 20,
        popular: false,
    },
    CreditPackage {
        id: "premium-pack",
        name: "Premium Ilimitado",
        description: "120 créditos = 2.400 mensagens (20 por crédito)",
        price_cents: 7_990,
        credits: 120,
        popular: true,
    },
];

/// Look up a credit package by ID.
pub fn find_package(package_id: &str) -> Option<&'static CreditPackage> {
    PACKAGES.iter().find(|p| p.id == package_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_defined() {
        assert_eq!(PACKAGES.len(), 2);
        assert_eq!(PACKAGES[0].id, "starter-pack");
        assert_eq!(PACKAGES[1].id, "premium-pack");
    }

    #[test]
    fn find_package_by_id() {
        let pkg = find_package("premium-pack").unwrap();
        assert_eq!(pkg.price_cents, 7_990);
        assert_eq!(pkg.credits, 120);
        assert!(pkg.popular);
    }

    #[test]
    fn find_package_unknown() {
        assert!(find_package("nonexistent").is_none());
    }
}
