//! Admin middleware.

use std::sync::Arc;

use salvo::prelude::*;

use crate::{
    extensions::*, instances::middleware::extract_bearer_token, state::State,
};

/// Rejects requests that do not carry the configured admin token.
#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let state = match depot.obtain_or_500::<Arc<State>>() {
        Ok(state) => state,
        Err(error) => {
            res.render(error);
            ctrl.skip_rest();

            return;
        }
    };

    let authorized = extract_bearer_token(req)
        .is_some_and(|token| tokens_match(token.as_bytes(), state.admin_token.as_bytes()));

    if !authorized {
        res.render(ApiError::unauthorized("Missing or invalid admin token"));
        ctrl.skip_rest();

        return;
    }

    ctrl.call_next(req, depot, res).await;
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}
