//! # Cart
//!
//! The working cart a sale is built from.
//!
//! ## Invariants
//! - Lines are unique by `product_id` (adding the same product merges quantity)
//! - Every quantity is within 1..=999
//! - At most 100 lines
//! - A line is only accepted when inventory holds enough stock
//!
//! The stock figure comes from the inventory collaborator; the cart only
//! compares it against the requested quantity.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_cart_size, validate_price_cents, validate_quantity};
use crate::MAX_CART_LINES;

/// One line of the cart.
///
/// The unit price is frozen when the line is added, so later price edits in
/// inventory do not change a sale in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Self {
        CartLine {
            product_id: product_id.into(),
            name: name.into(),
            unit_price_cents: unit_price.cents(),
            quantity,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    fn validate(&self) -> CoreResult<()> {
        validate_quantity(self.quantity)?;
        validate_price_cents(self.unit_price_cents)?;
        Ok(())
    }
}

/// The working cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a line or merges it into an existing line for the same product.
    ///
    /// `available` is the inventory's stock figure for the product; `None`
    /// means the product is not stock-tracked.
    ///
    /// ## Errors
    /// - `Validation` for a bad quantity/price or a full cart
    /// - `InsufficientStock` when the merged quantity exceeds `available`
    pub fn add_line(&mut self, line: CartLine, available: Option<i64>) -> CoreResult<()> {
        line.validate()?;

        let existing = self.lines.iter().position(|l| l.product_id == line.product_id);
        let requested = match existing {
            Some(i) => self.lines[i].quantity + line.quantity,
            None => {
                validate_cart_size(self.lines.len())?;
                line.quantity
            }
        };

        validate_quantity(requested)?;
        check_stock(&line.product_id, requested, available)?;

        match existing {
            Some(i) => self.lines[i].quantity = requested,
            None => self.lines.push(line),
        }
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        quantity: i64,
        available: Option<i64>,
    ) -> CoreResult<()> {
        if quantity == 0 {
            self.remove_line(product_id);
            return Ok(());
        }

        validate_quantity(quantity)?;
        check_stock(product_id, quantity, available)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| {
                ValidationError::invalid_format("product", format!("{product_id} is not in the cart"))
            })?;
        line.quantity = quantity;
        Ok(())
    }

    /// Removes a line, returning it if it was present.
    pub fn remove_line(&mut self, product_id: &str) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.product_id == product_id)?;
        Some(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Takes the quantities of a sold cart out of this one.
    ///
    /// Lines that drop to zero are removed; anything added since `sold` was
    /// taken is left in place.
    pub fn remove_sold(&mut self, sold: &Cart) {
        for sold_line in &sold.lines {
            if let Some(line) = self
                .lines
                .iter_mut()
                .find(|l| l.product_id == sold_line.product_id)
            {
                line.quantity -= sold_line.quantity;
            }
        }
        self.lines.retain(|l| l.quantity > 0);
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Checks the cart is ready for checkout.
    pub fn validate(&self) -> CoreResult<()> {
        if self.lines.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        if self.lines.len() > MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }
        for line in &self.lines {
            line.validate()?;
        }
        Ok(())
    }
}

fn check_stock(product_id: &str, requested: i64, available: Option<i64>) -> CoreResult<()> {
    match available {
        Some(available) if requested > available => Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available,
            requested,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
