//! Subscription Registry
//!
//! Tracks, per channel, the set of subscribed symbols and the list of
//! registered handlers. The registry is the source of truth for desired
//! subscription state: the live connection is reconciled to match it on
//! every (re)connect, never the other way around.
//!
//! # Invariants
//!
//! - Symbols are normalized to uppercase at admission.
//! - Registering the same handler (by `Arc` identity) twice on a channel
//!   is a no-op.
//! - Removing symbols never removes handlers; handler lifetime is
//!   independent of symbol lifetime.
//! - The registry never touches the transport.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::streaming::{BarData, Channel, QuoteData, TradeData};

// =============================================================================
// Handler Types
// =============================================================================

/// Callback invoked for each inbound quote.
pub type QuoteHandler = Arc<dyn Fn(QuoteData) + Send + Sync>;

/// Callback invoked for each inbound trade.
pub type TradeHandler = Arc<dyn Fn(TradeData) + Send + Sync>;

/// Callback invoked for each inbound bar.
pub type BarHandler = Arc<dyn Fn(BarData) + Send + Sync>;

// =============================================================================
// Per-Channel State
// =============================================================================

/// Symbol set and handler list for a single channel.
struct ChannelState<H: ?Sized> {
    symbols: HashSet<String>,
    handlers: Vec<Arc<H>>,
}

impl<H: ?Sized> Default for ChannelState<H> {
    fn default() -> Self {
        Self {
            symbols: HashSet::new(),
            handlers: Vec::new(),
        }
    }
}

impl<H: ?Sized> ChannelState<H> {
    /// Union the uppercased symbols into the set and register the handler
    /// if not already present. Returns the symbols that were newly added,
    /// sorted for deterministic protocol traffic.
    fn add(&mut self, symbols: &[String], handler: Arc<H>) -> Vec<String> {
        let mut added: Vec<String> = symbols
            .iter()
            .map(|s| s.to_uppercase())
            .filter(|s| self.symbols.insert(s.clone()))
            .collect();
        added.sort_unstable();
        added.dedup();

        if !self.handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            self.handlers.push(handler);
        }

        added
    }

    /// Remove the uppercased symbols from the set. Returns the
    /// intersection actually removed, sorted.
    fn remove(&mut self, symbols: &[String]) -> Vec<String> {
        let mut removed: Vec<String> = symbols
            .iter()
            .map(|s| s.to_uppercase())
            .filter(|s| self.symbols.remove(s))
            .collect();
        removed.sort_unstable();
        removed
    }

    fn symbols_sorted(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.symbols.iter().cloned().collect();
        symbols.sort_unstable();
        symbols
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Per-channel subscription state shared between the client facade and
/// the connection driver.
///
/// The facade is the only writer; the driver reads it for resubscription
/// replay and dispatches inbound messages through it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    quotes: RwLock<ChannelState<dyn Fn(QuoteData) + Send + Sync>>,
    trades: RwLock<ChannelState<dyn Fn(TradeData) + Send + Sync>>,
    bars: RwLock<ChannelState<dyn Fn(BarData) + Send + Sync>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add quote subscriptions. Returns the newly added symbols.
    pub fn add_quotes(&self, symbols: &[String], handler: QuoteHandler) -> Vec<String> {
        self.quotes.write().add(symbols, handler)
    }

    /// Add trade subscriptions. Returns the newly added symbols.
    pub fn add_trades(&self, symbols: &[String], handler: TradeHandler) -> Vec<String> {
        self.trades.write().add(symbols, handler)
    }

    /// Add bar subscriptions. Returns the newly added symbols.
    pub fn add_bars(&self, symbols: &[String], handler: BarHandler) -> Vec<String> {
        self.bars.write().add(symbols, handler)
    }

    /// Remove quote subscriptions. Returns the symbols actually removed.
    pub fn remove_quotes(&self, symbols: &[String]) -> Vec<String> {
        self.quotes.write().remove(symbols)
    }

    /// Remove trade subscriptions. Returns the symbols actually removed.
    pub fn remove_trades(&self, symbols: &[String]) -> Vec<String> {
        self.trades.write().remove(symbols)
    }

    /// Remove bar subscriptions. Returns the symbols actually removed.
    pub fn remove_bars(&self, symbols: &[String]) -> Vec<String> {
        self.bars.write().remove(symbols)
    }

    /// Current symbols subscribed on a channel, sorted.
    #[must_use]
    pub fn symbols(&self, channel: Channel) -> Vec<String> {
        match channel {
            Channel::Quotes => self.quotes.read().symbols_sorted(),
            Channel::Trades => self.trades.read().symbols_sorted(),
            Channel::Bars => self.bars.read().symbols_sorted(),
        }
    }

    /// Number of handlers registered on a channel.
    #[must_use]
    pub fn handler_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::Quotes => self.quotes.read().handlers.len(),
            Channel::Trades => self.trades.read().handlers.len(),
            Channel::Bars => self.bars.read().handlers.len(),
        }
    }

    /// Immutable copy of every channel with at least one symbol, for
    /// resubscription replay after (re)connect.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Channel, Vec<String>)> {
        Channel::all()
            .iter()
            .map(|channel| (*channel, self.symbols(*channel)))
            .filter(|(_, symbols)| !symbols.is_empty())
            .collect()
    }

    /// Dispatch a quote to every registered quote handler, in
    /// registration order. A panicking handler is logged and skipped; it
    /// never aborts dispatch to subsequent handlers.
    pub fn dispatch_quote(&self, quote: &QuoteData) {
        let handlers = self.quotes.read().handlers.clone();
        Self::dispatch(&handlers, |handler| handler(quote.clone()), "quote");
    }

    /// Dispatch a trade to every registered trade handler.
    pub fn dispatch_trade(&self, trade: &TradeData) {
        let handlers = self.trades.read().handlers.clone();
        Self::dispatch(&handlers, |handler| handler(trade.clone()), "trade");
    }

    /// Dispatch a bar to every registered bar handler.
    pub fn dispatch_bar(&self, bar: &BarData) {
        let handlers = self.bars.read().handlers.clone();
        Self::dispatch(&handlers, |handler| handler(bar.clone()), "bar");
    }

    fn dispatch<H: ?Sized>(handlers: &[Arc<H>], invoke: impl Fn(&Arc<H>), channel: &str) {
        for (index, handler) in handlers.iter().enumerate() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| invoke(handler)));
            if result.is_err() {
                tracing::error!(channel, handler = index, "handler panicked during dispatch");
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("quotes", &self.symbols(Channel::Quotes))
            .field("trades", &self.symbols(Channel::Trades))
            .field("bars", &self.symbols(Channel::Bars))
            .finish()
    }
}
