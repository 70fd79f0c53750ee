//! Quine–McCluskey boolean minimization.
//!
//! Variables are MSB-first: variable `i` of `n` owns bit `n - 1 - i` of a
//! minterm index.

use std::collections::{BTreeSet, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimplifiedExpression {
    /// Sum-of-products over `&`, `|` and `~`, or the constants `"True"`
    /// and `"False"`.
    pub expression: String,
    pub atoms: BTreeSet<String>,
}

#[derive(Clone, Debug)]
struct Implicant {
    mask: u32,
    value: u32,
    covers: BTreeSet<u32>,
}

pub fn simplify(variables: &[String], minterms: &[u32]) -> SimplifiedExpression {
    let n = variables.len() as u32;
    let full = 1u64 << n;

    let wanted: BTreeSet<u32> = minterms.iter().copied().collect();

    if wanted.is_empty() {
        return SimplifiedExpression {
            expression: "False".to_owned(),
            atoms: BTreeSet::new(),
        };
    }
    if wanted.len() as u64 == full {
        return SimplifiedExpression {
            expression: "True".to_owned(),
            atoms: BTreeSet::new(),
        };
    }

    let primes = prime_implicants(n, &wanted);
    let selected = cover(&primes, &wanted);

    let products: Vec<String> = selected
        .iter()
        .map(|imp| format_product(variables, imp))
        .collect();

    let mut atoms = BTreeSet::new();
    for imp in &selected {
        for i in 0..n {
            if imp.mask & (1 << (n - 1 - i)) != 0 {
                atoms.insert(variables[i as usize].clone());
            }
        }
    }

    let expression = if products.len() == 1 {
        products.into_iter().next().unwrap()
    } else {
        products
            .iter()
            .map(|p| {
                if p.contains(" & ") {
                    format!("({p})")
                } else {
                    p.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };

    SimplifiedExpression { expression, atoms }
}

fn prime_implicants(n: u32, minterms: &BTreeSet<u32>) -> Vec<Implicant> {
    let all_ones = if n == 32 { u32::MAX } else { (1 << n) - 1 };

    let mut current: Vec<Implicant> = minterms
        .iter()
        .map(|&m| Implicant {
            mask: all_ones,
            value: m,
            covers: BTreeSet::from([m]),
        })
        .collect();

    let mut primes = Vec::new();

    loop {
        let mut used = vec![false; current.len()];
        let mut next: Vec<Implicant> = Vec::new();
        let mut seen: HashSet<(u32, u32)> = HashSet::new();

        for i in 0..current.len() {
            for j in i + 1..current.len() {
                if current[i].mask != current[j].mask {
                    continue;
                }

                let diff = current[i].value ^ current[j].value;
                if diff.count_ones() != 1 || current[i].mask & diff == 0 {
                    continue;
                }

                used[i] = true;
                used[j] = true;

                let mask = current[i].mask & !diff;
                let value = current[i].value & mask;
                if seen.insert((mask, value)) {
                    let covers = current[i]
                        .covers
                        .union(&current[j].covers)
                        .copied()
                        .collect();
                    next.push(Implicant { mask, value, covers });
                }
            }
        }

        for (imp, used) in current.iter().zip(&used) {
            if !used {
                primes.push(imp.clone());
            }
        }

        if next.is_empty() {
            break;
        }
        current = next;
    }

    primes
}

fn cover(primes: &[Implicant], minterms: &BTreeSet<u32>) -> Vec<Implicant> {
    let mut selected_indices: Vec<usize> = Vec::new();
    let mut covered: BTreeSet<u32> = BTreeSet::new();

    // Essential primes: the sole cover of some minterm.
    for &m in minterms {
        let covering: Vec<usize> = primes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.covers.contains(&m))
            .map(|(i, _)| i)
            .collect();

        if let [only] = covering[..] {
            if !selected_indices.contains(&only) {
                selected_indices.push(only);
                covered.extend(&primes[only].covers);
            }
        }
    }

    // Greedy pass over whatever is left, largest remaining cover first,
    // first-seen order breaking ties.
    while covered.len() < minterms.len() {
        let mut best: Option<(usize, usize)> = None;
        for (i, prime) in primes.iter().enumerate() {
            if selected_indices.contains(&i) {
                continue;
            }
            let gain = prime.covers.difference(&covered).count();
            if gain > best.map_or(0, |(_, g)| g) {
                best = Some((i, gain));
            }
        }

        let Some((i, _)) = best else { break };
        selected_indices.push(i);
        covered.extend(&primes[i].covers);
    }

    selected_indices
        .into_iter()
        .map(|i| primes[i].clone())
        .collect()
}

fn format_product(variables: &[String], imp: &Implicant) -> String {
    let n = variables.len() as u32;
    let mut literals = Vec::new();

    for i in 0..n {
        let bit = 1 << (n - 1 - i);
        if imp.mask & bit == 0 {
            continue;
        }
        if imp.value & bit != 0 {
            literals.push(variables[i as usize].clone());
        } else {
            literals.push(format!("~{}", variables[i as usize]));
        }
    }

    literals.join(" & ")
}
