use anyhow::{anyhow, Context, Result};
use duel_types::{MatchError, WORD_LENGTH};
use rand::seq::IndexedRandom;
use std::path::Path;

const BUILTIN_SECRETS: &str = "
about above actor acute adopt adult after again agent agree ahead alarm album alert alike alive
allow alloy alone along alter amber angel anger angle angry apple apply arena argue arise armor
aside asset audio audit avoid award aware badge baker basic beach beast begin being below bench
birth black blade blame blank blast blend blind block blood board boost booth brain brand brave
bread break brick bride brief bring broad brown brush build built buyer cabin cable candy cargo
carry catch cause chain chair chalk charm chart chase cheap check chess chest chief child civic
claim class clean clear clerk climb clock close cloud coach coast color couch count court cover
crack craft crane crash cream crime crisp cross crowd crown curve cycle daily dance death delay
depth dough draft drama dream dress drink drive eager early earth eight elite empty enemy enjoy
enter entry equal error event exact exist extra faith false fancy feast fiber field fight final
flame fleet flesh float floor flour fluid focus force forge forth frame fresh front frost fruit
giant given glass globe glory grace grade grain grand grant grape grass great green group guard
guess guest guide happy harsh heart heavy hobby honey horse hotel house human humor ideal image
index inner input issue jelly jewel joint judge juice knife label labor large laser later laugh
layer learn lemon level light limit local logic loose lucky lunch magic major maker march match
metal model money month moral motor mount mouse mouth movie music nerve never night noble noise
north novel nurse ocean offer often olive onion opera orbit order other outer owner paint panel
paper party peace pearl phase phone photo piano piece pilot pitch place plain plane plant plate
point power press price pride prime print prize proof proud quiet quick radio raise range rapid
ratio reach ready realm rebel relax reply right river robot rough round route royal rural salad
scale scene scope score sense serve seven shape share sharp sheep shelf shell shift shine shirt
shock shore short sight skill sleep slice slide smart smile smoke snake solid solve sound south
space spare speak speed spend spice spite split sport staff stage stake stand start steam steel
stick still stone storm story stove strip study style sugar suite sunny super sweet swing table
taste teach thank theme thick thing think third throw tiger title toast topic total touch tower
track trade trail train treat trend trial tribe trick truck trust truth twist uncle union unity
upper urban usage usual valid value video vital vivid voice waste watch water whale wheat wheel
while white whole world worry worth wound write wrong young youth zebra
";

/// Guess format checks and the pool secrets are drawn from.
///
/// Guesses are only checked for shape; whether a guess is a real word is
/// left to the client.
pub struct WordValidator {
    secrets: Vec<String>,
}

impl WordValidator {
    /// Build a secret pool from a whitespace separated word list.
    /// Lines starting with `#` are comments; anything that is not a
    /// `WORD_LENGTH` letter word is skipped.
    pub fn new(word_list: &str) -> Self {
        let mut secrets: Vec<String> = word_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .flat_map(str::split_whitespace)
            .filter_map(|word| Self::normalize_guess(word).ok())
            .collect();
        secrets.sort();
        secrets.dedup();

        Self { secrets }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_SECRETS)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading word list {}", path.display()))?;

        let validator = Self::new(&contents);
        if validator.secrets.is_empty() {
            return Err(anyhow!(
                "word list {} has no {}-letter words",
                path.display(),
                WORD_LENGTH
            ));
        }
        Ok(validator)
    }

    /// Pick a secret uniformly at random.
    pub fn random_secret(&self) -> Result<String> {
        self.secrets
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| anyhow!("No {}-letter words available", WORD_LENGTH))
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Upper-case a guess and check it is exactly `WORD_LENGTH` letters A-Z.
    pub fn normalize_guess(word: &str) -> Result<String, MatchError> {
        let word = word.trim();

        if !word.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MatchError::invalid_guess("only letters A-Z are allowed"));
        }

        if word.len() != WORD_LENGTH {
            return Err(MatchError::invalid_guess(format!(
                "guess must be {} letters, got {}",
                WORD_LENGTH,
                word.len()
            )));
        }

        Ok(word.to_ascii_uppercase())
    }
}
