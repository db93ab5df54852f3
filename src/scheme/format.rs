//! Human-readable rendering of schemes.

use std::fmt;

use num_traits::{Signed, Zero};

use super::Scheme;
use crate::ring::{Coeff, Ring};

impl Scheme {
    /// Signed sum of named terms (`a11 - 2a12 + b21`, or `m1 ⊕ m3` over Gf2)
    fn addition(&self, terms: impl IntoIterator<Item = (Coeff, String)>) -> String {
        if self.ring == Ring::Gf2 {
            return terms
                .into_iter()
                .filter(|(value, _)| !self.ring.is_zero(value))
                .map(|(_, name)| name)
                .collect::<Vec<_>>()
                .join(" ⊕ ");
        }

        let mut out = String::new();
        for (value, name) in terms {
            if value.is_zero() {
                continue;
            }
            let magnitude = value.abs();
            let coefficient = if magnitude == Coeff::from_integer(1) {
                String::new()
            } else {
                magnitude.to_string()
            };
            let sign = match (out.is_empty(), value.is_negative()) {
                (true, false) => "",
                (true, true) => "-",
                (false, false) => " + ",
                (false, true) => " - ",
            };
            out.push_str(sign);
            out.push_str(&coefficient);
            out.push_str(&name);
        }
        out
    }

    fn product_symbol(&self) -> &'static str {
        if self.ring == Ring::Gf2 { "∧" } else { "*" }
    }

    /// One line per product: `m1 = (a11 + a22) * (b11 + b22)`
    pub fn multiplications(&self) -> Vec<String> {
        let d = self.dims;
        (0..self.rank())
            .map(|r| {
                let alpha = self.addition((0..d.u_len()).map(|i| (self.u[r][i], format!("a{}{}", i / d.n2 + 1, i % d.n2 + 1))));
                let beta = self.addition((0..d.v_len()).map(|j| (self.v[r][j], format!("b{}{}", j / d.n3 + 1, j % d.n3 + 1))));
                format!("m{} = ({alpha}) {} ({beta})", r + 1, self.product_symbol())
            })
            .collect()
    }

    /// One line per output entry: the evaluated expression and the products used
    pub fn elements(&self) -> Vec<String> {
        let d = self.dims;
        let mut lines = Vec::with_capacity(d.n1 * d.n3);

        for a in 0..d.n1 {
            for c in 0..d.n3 {
                let k = c * d.n1 + a;
                let mut expression = Vec::new();
                for i in 0..d.u_len() {
                    for j in 0..d.v_len() {
                        let sum = (0..self.rank()).fold(Coeff::zero(), |acc, r| acc + self.u[r][i] * self.v[r][j] * self.w[r][k]);
                        let name = format!(
                            "a{}{} {} b{}{}",
                            i / d.n2 + 1,
                            i % d.n2 + 1,
                            self.product_symbol(),
                            j / d.n3 + 1,
                            j % d.n3 + 1
                        );
                        expression.push((self.ring.reduce(sum), name));
                    }
                }
                let element = self.addition((0..self.rank()).map(|r| (self.w[r][k], format!("m{}", r + 1))));
                lines.push(format!("c{}{} = {} = {element}", a + 1, c + 1, self.addition(expression)));
            }
        }
        lines
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} scheme over {}, m = {}", self.dims, self.ring, self.rank())?;
        for line in self.multiplications() {
            writeln!(f, "{line}")?;
        }
        for line in self.elements() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
