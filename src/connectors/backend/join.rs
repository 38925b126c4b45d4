use std::collections::{HashMap, HashSet};

use crate::models::{Company, Deal, DealCard, DealsWithCompanies};

/// Denormalize deals→company into display cards, newest deal first.
pub fn join_deals(mut deals: Vec<Deal>, companies: Vec<Company>) -> DealsWithCompanies {
    deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let by_id: HashMap<_, _> = companies.iter().map(|c| (c.id, c)).collect();
    let cards = deals
        .into_iter()
        .map(|deal| {
            let company = by_id.get(&deal.company_id).map(|c| (*c).clone());
            if company.is_none() {
                tracing::debug!(deal_id = %deal.id, company_id = %deal.company_id, "deal without company");
            }
            DealCard { deal, company }
        })
        .collect();

    DealsWithCompanies {
        deals: cards,
        companies,
    }
}

/// Cards whose company arrived embedded, newest deal first. Each company is
/// listed once, in the order it first appears.
pub fn from_cards(mut cards: Vec<DealCard>) -> DealsWithCompanies {
    cards.sort_by(|a, b| b.deal.created_at.cmp(&a.deal.created_at));

    let mut seen = HashSet::new();
    let companies = cards
        .iter()
        .filter_map(|card| card.company.as_ref())
        .filter(|company| seen.insert(company.id))
        .cloned()
        .collect();

    DealsWithCompanies {
        deals: cards,
        companies,
    }
}
