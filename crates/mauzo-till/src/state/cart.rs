//! # Cart State
//!
//! The working cart, shared between cart edits and checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operator action          Till call               Cart change           │
//! │  ───────────────          ─────────               ───────────           │
//! │  Scan product ──────────► add_to_cart() ────────► add_line (stock chk)  │
//! │  Change quantity ───────► set_quantity() ───────► lines[i].qty = n      │
//! │  Remove line ───────────► remove_line() ────────► lines.remove(i)       │
//! │  Checkout ──────────────► snapshot() ───────────► (read only)           │
//! │  Sale committed ────────► remove_sold() ────────► sold qty taken out    │
//! │  Logout ────────────────► clear() ──────────────► lines.clear()         │
//! │                                                                         │
//! │  A failed or cancelled checkout never clears the cart.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use mauzo_core::{Cart, CoreResult};

use crate::error::{TillError, TillResult};

#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> TillResult<MutexGuard<'_, Cart>> {
        self.cart
            .lock()
            .map_err(|_| TillError::Internal("Cart lock poisoned".into()))
    }

    /// A copy of the cart as it is right now.
    pub fn snapshot(&self) -> TillResult<Cart> {
        Ok(self.lock()?.clone())
    }

    /// Applies a cart edit. A rejected edit leaves the cart unchanged.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Cart) -> CoreResult<T>) -> TillResult<T> {
        let mut guard = self.lock()?;
        let mut draft = guard.clone();
        let out = edit(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    pub fn clear(&self) -> TillResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Removes what a committed sale took from `sold`, keeping later edits.
    pub fn remove_sold(&self, sold: &Cart) -> TillResult<()> {
        self.lock()?.remove_sold(sold);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mauzo_core::{CartLine, CoreError, Money};

    #[test]
    fn test_rejected_edit_leaves_cart_alone() {
        let state = CartState::new();
        state
            .update(|c| c.add_line(CartLine::new("p-1", "Maziwa", Money::from_major(60), 2), Some(5)))
            .unwrap();

        let err = state
            .update(|c| c.add_line(CartLine::new("p-1", "Maziwa", Money::from_major(60), 4), Some(5)))
            .unwrap_err();
        assert!(matches!(
            err,
            TillError::Core(CoreError::InsufficientStock { requested: 6, .. })
        ));

        let cart = state.snapshot().unwrap();
        assert_eq!(cart.total_quantity(), 2);
        assert_eq!(cart.total(), Money::from_major(120));
    }

    #[test]
    fn test_remove_sold_leaves_top_up() {
        let state = CartState::new();
        state
            .update(|c| c.add_line(CartLine::new("p-1", "Mkate", Money::from_major(65), 2), None))
            .unwrap();
        let sold = state.snapshot().unwrap();
        state
            .update(|c| c.add_line(CartLine::new("p-1", "Mkate", Money::from_major(65), 1), None))
            .unwrap();

        state.remove_sold(&sold).unwrap();

        let left = state.snapshot().unwrap();
        assert_eq!(left.line_count(), 1);
        assert_eq!(left.total_quantity(), 1);
    }

    #[test]
    fn test_clear() {
        let state = CartState::new();
        state
            .update(|c| c.add_line(CartLine::new("p-1", "Mkate", Money::from_major(65), 1), None))
            .unwrap();
        state.clear().unwrap();
        assert!(state.snapshot().unwrap().is_empty());
    }
}
