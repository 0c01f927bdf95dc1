//! Job effects - drive the state machine from job events.
//!
//! Effects use `.then()` and return `Ok(())`; follow-up events are emitted
//! on the context so each stage runs as its own effect invocation.

use std::sync::Arc;

use seesaw_core::{effect, EffectContext};

use super::events::JobEvent;
use super::machine::JobStateMachine;
use crate::common::AppState;
use crate::kernel::ServerDeps;

/// Build the job lifecycle effect.
///
/// Stage failures are turned into `Failed` events by the state machine, so
/// only infrastructure errors reach the engine's error handler.
pub fn job_effect() -> seesaw_core::effect::Effect<AppState, ServerDeps> {
    effect::on::<JobEvent>().id("job_lifecycle").then(
        |event: Arc<JobEvent>, ctx: EffectContext<AppState, ServerDeps>| async move {
            let machine = JobStateMachine::new(ctx.deps().clone());
            for next in machine.handle(event.as_ref().clone()).await? {
                ctx.emit(next);
            }
            Ok(())
        },
    )
}
