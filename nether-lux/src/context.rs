//! Lighting stage binding
//!
//! One environment is active at a time. Instead of a process-wide global,
//! the binding is an explicit value the render path owns and passes into
//! draw-call encoding; binding moves an environment in, unbinding hands it
//! back and disables the lighting stage.

use crate::env::{FlushReport, LightEnv, LightError};

/// The render path's handle to the currently active light environment
#[derive(Debug, Default)]
pub struct LightingContext {
    active: Option<LightEnv>,
}

impl LightingContext {
    /// Context with the lighting stage disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `env` the active environment, returning the one it replaces
    ///
    /// No validation happens here; `flush()` is where invalid state is
    /// rejected.
    pub fn bind(&mut self, env: LightEnv) -> Option<LightEnv> {
        self.active.replace(env)
    }

    /// Take the active environment out, disabling the lighting stage
    pub fn unbind(&mut self) -> Option<LightEnv> {
        self.active.take()
    }

    /// True when an environment is bound
    pub fn is_bound(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&LightEnv> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut LightEnv> {
        self.active.as_mut()
    }

    /// Reconcile the bound environment before a draw
    ///
    /// `Ok(None)` means no environment is bound and the draw renders with
    /// lighting disabled.
    pub fn flush(&mut self) -> Result<Option<FlushReport>, LightError> {
        match self.active.as_mut() {
            Some(env) => env.flush().map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_flush_disables_lighting() {
        let mut ctx = LightingContext::new();
        assert!(!ctx.is_bound());
        assert_eq!(ctx.flush(), Ok(None));
    }

    #[test]
    fn test_bind_swaps_environments() {
        let mut ctx = LightingContext::new();
        let mut first = LightEnv::new();
        first.set_ambient(1.0, 0.0, 0.0);

        assert!(ctx.bind(first).is_none());
        assert!(ctx.is_bound());

        let previous = ctx.bind(LightEnv::new()).unwrap();
        assert_eq!(previous.ambient(), [1.0, 0.0, 0.0]);

        let unbound = ctx.unbind().unwrap();
        assert_eq!(unbound.ambient(), [0.0; 3]);
        assert!(!ctx.is_bound());
    }
}
