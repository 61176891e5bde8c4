// SPDX-License-Identifier: AGPL-3.0-only

//! Activation functions

use smiv_models::Activation;

/// Apply `act` to one value.
#[inline]
pub fn activate(act: Activation, x: f32) -> f32 {
    match act {
        Activation::None => x,
        Activation::Relu => x.max(0.0),
        Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        Activation::Tanh => x.tanh(),
    }
}

/// Apply `act` in place to the first `cols` elements of every
/// `padded_cols`-wide row of `data`. Padding is left untouched.
pub fn activate_rows(data: &mut [f32], cols: usize, padded_cols: usize, act: Activation) {
    if act == Activation::None || padded_cols == 0 {
        return;
    }
    for row in data.chunks_mut(padded_cols) {
        for x in row.iter_mut().take(cols) {
            *x = activate(act, *x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_functions() {
        assert_eq!(activate(Activation::Relu, -2.0), 0.0);
        assert_eq!(activate(Activation::Relu, 3.0), 3.0);
        assert!((activate(Activation::Sigmoid, 0.0) - 0.5).abs() < 1e-7);
        assert!((activate(Activation::Tanh, 1.0) - 1.0f32.tanh()).abs() < 1e-7);
        assert_eq!(activate(Activation::None, -1.5), -1.5);
    }

    #[test]
    fn padding_survives_sigmoid() {
        let mut data = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        activate_rows(&mut data, 2, 3, Activation::Sigmoid);
        assert_eq!(data, [0.5, 0.5, 0.0, 0.5, 0.5, 0.0]);
    }
}
