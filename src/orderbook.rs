//! Binance order book reconstruction
//!
//! A book is seeded from a REST depth snapshot and advanced with diff-depth
//! stream updates, following Binance's sequencing rules: updates that end
//! before the book's last id are stale, updates that start after
//! `last_update_id + 1` mean events were lost.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderBookError {
    #[error("received update with id {received} but expected {expected}")]
    Gap { received: u64, expected: u64 },
}

/// Number that Binance may send either as JSON number or as string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn value(&self) -> Result<f64, String> {
        match self {
            RawNumber::Number(n) => Ok(*n),
            RawNumber::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("invalid number: {:?}", s)),
        }
    }
}

/// `[price, qty]` or `{"price": .., "qty": ..}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Pair(Vec<RawNumber>),
    Object { price: RawNumber, qty: RawNumber },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawLevel")]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

impl TryFrom<RawLevel> for PriceLevel {
    type Error = String;

    fn try_from(raw: RawLevel) -> Result<Self, Self::Error> {
        match raw {
            RawLevel::Pair(values) => match values.as_slice() {
                [price, qty, ..] => Ok(Self::new(price.value()?, qty.value()?)),
                _ => Err(format!("price level needs 2 values, got {}", values.len())),
            },
            RawLevel::Object { price, qty } => Ok(Self::new(price.value()?, qty.value()?)),
        }
    }
}

/// Map key ordering prices with `f64::total_cmp`
#[derive(Debug, Clone, Copy)]
struct PriceKey(f64);

impl PartialEq for PriceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriceKey {}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One side of the book, sorted by price
#[derive(Debug, Clone, Default)]
pub struct Levels {
    levels: BTreeMap<PriceKey, PriceLevel>,
}

impl Levels {
    /// Insert or replace levels; a zero quantity removes the price
    pub fn merge(&mut self, levels: &[PriceLevel]) {
        for level in levels {
            if level.quantity == 0.0 {
                self.levels.remove(&PriceKey(level.price));
            } else {
                self.levels.insert(PriceKey(level.price), *level);
            }
        }
    }

    /// Up to `n` levels from the highest price down
    pub fn highest(&self, n: usize) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.levels.values().rev().take(n)
    }

    /// Up to `n` levels from the lowest price up
    pub fn lowest(&self, n: usize) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.levels.values().take(n)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// REST depth snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
}

/// Diff-depth stream event payload
#[derive(Debug, Clone, Deserialize)]
pub struct PartialUpdate {
    #[serde(rename = "b")]
    pub bids: Vec<PriceLevel>,
    #[serde(rename = "a")]
    pub asks: Vec<PriceLevel>,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub last_update_id: u64,
}

#[derive(Debug, Clone)]
pub struct OrderBook {
    bids: Levels,
    asks: Levels,
    last_update_id: u64,
}

impl OrderBook {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut book = Self {
            bids: Levels::default(),
            asks: Levels::default(),
            last_update_id: snapshot.last_update_id,
        };
        book.bids.merge(&snapshot.bids);
        book.asks.merge(&snapshot.asks);
        book
    }

    /// Apply one update. `Ok(false)` means it was stale and skipped.
    pub fn apply(&mut self, update: &PartialUpdate) -> Result<bool, OrderBookError> {
        if update.last_update_id < self.last_update_id {
            return Ok(false);
        }

        let expected = self.last_update_id + 1;
        if update.first_update_id > expected {
            return Err(OrderBookError::Gap {
                received: update.first_update_id,
                expected,
            });
        }

        self.bids.merge(&update.bids);
        self.asks.merge(&update.asks);
        self.last_update_id = update.last_update_id;
        Ok(true)
    }

    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.highest(1).next()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.lowest(1).next()
    }

    /// Best `n` bids, best first
    pub fn best_bids(&self, n: usize) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.bids.highest(n)
    }

    /// Best `n` asks, best first
    pub fn best_asks(&self, n: usize) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.asks.lowest(n)
    }

    /// Total number of price levels on both sides
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
