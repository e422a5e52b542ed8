use rand::Rng;
use rand::seq::SliceRandom;

const GREEK_LETTERS: &[&str] = &[
  "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
  "iota", "kappa", "lambda", "mu", "nu", "xi", "omicron", "pi", "rho",
  "sigma", "tau", "upsilon", "phi", "chi", "psi", "omega",
];

/// Random `<greek letter>-<1..24>-<suffix>` name
pub fn generate_name(suffix: &str) -> String {
  let mut rng = rand::thread_rng();
  let letter = GREEK_LETTERS.choose(&mut rng).unwrap_or(&"alpha");
  let number = rng.gen_range(1..=24);
  format!("{}-{}-{}", letter, number, suffix)
}

#[cfg(test)]
mod test_name {
  use super::*;
  use crate::models::validate_name;

  #[test]
  fn generated_names_are_valid() {
    for _ in 0..50 {
      let name = generate_name("cluster");
      assert!(name.ends_with("-cluster"));
      let parts = name.split('-').collect::<Vec<&str>>();
      assert!(GREEK_LETTERS.contains(&parts[0]));
      let number = parts[1].parse::<u32>().unwrap();
      assert!((1..=24).contains(&number));
      assert!(validate_name(&name).is_ok());
    }
  }
}
