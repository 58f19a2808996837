//! Ordered list of user scripts evaluated together on every tick.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::candle::CandleSource;
use crate::engine::ScriptEngine;
use crate::error::ManagerError;
use crate::output::ScriptOutput;

/// Error text of the placeholder record a disabled script produces.
pub const DISABLED: &str = "Disabled";

/// One script in the list, with its own engine and tuned inputs.
#[derive(Debug)]
pub struct ActiveScript {
    name: String,
    source: String,
    enabled: bool,
    inputs: HashMap<String, f64>,
    path: Option<PathBuf>,
    engine: ScriptEngine,
    last_output: Option<ScriptOutput>,
}

impl ActiveScript {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            enabled: true,
            inputs: HashMap::new(),
            path: None,
            engine: ScriptEngine::new(),
            last_output: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Working input values: user overrides plus defaults discovered on
    /// earlier runs.
    pub fn inputs(&self) -> &HashMap<String, f64> {
        &self.inputs
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn last_output(&self) -> Option<&ScriptOutput> {
        self.last_output.as_ref()
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    fn run(&mut self, candles: &dyn CandleSource) -> ScriptOutput {
        if !self.enabled {
            return ScriptOutput::failed(self.name.clone(), DISABLED);
        }

        let output = self.engine.run(&self.source, candles, &self.inputs);
        for input in &output.inputs {
            self.inputs
                .entry(input.name.clone())
                .or_insert(input.default);
        }
        output
    }
}

#[derive(Debug, Default)]
pub struct ScriptManager {
    scripts: Vec<ActiveScript>,
}

impl ScriptManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an enabled script and returns its position.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        let script = ActiveScript::new(name, source);
        info!(name = %script.name, index = self.scripts.len(), "added script");
        self.scripts.push(script);
        self.scripts.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<ActiveScript, ManagerError> {
        self.check(index)?;
        let script = self.scripts.remove(index);
        info!(name = %script.name, index, "removed script");
        Ok(script)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ManagerError> {
        self.script_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// Flips the enabled flag and returns the new state.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ManagerError> {
        let script = self.script_mut(index)?;
        script.enabled = !script.enabled;
        Ok(script.enabled)
    }

    pub fn update_source(
        &mut self,
        index: usize,
        source: impl Into<String>,
    ) -> Result<(), ManagerError> {
        self.script_mut(index)?.source = source.into();
        Ok(())
    }

    pub fn set_input(
        &mut self,
        index: usize,
        name: impl Into<String>,
        value: f64,
    ) -> Result<(), ManagerError> {
        self.script_mut(index)?.inputs.insert(name.into(), value);
        Ok(())
    }

    /// Evaluates every script against `candles`, one record per script in
    /// list order. Broken or disabled scripts still get a record.
    pub fn run_all(&mut self, candles: &dyn CandleSource) -> Vec<ScriptOutput> {
        self.scripts
            .iter_mut()
            .map(|script| {
                let output = script.run(candles);
                if script.enabled && !output.is_ok() {
                    warn!(name = %script.name, error = ?output.error, "script produced an error");
                }
                script.last_output = Some(output.clone());
                output
            })
            .collect()
    }

    /// Reads a script file and appends it, named after the file stem.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, ManagerError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ManagerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let index = self.add(name, source);
        self.scripts[index].path = Some(path.to_path_buf());
        info!(path = %path.display(), index, "loaded script");
        Ok(index)
    }

    /// Writes the script back to the file it was loaded from or last saved to.
    pub fn save(&self, index: usize) -> Result<(), ManagerError> {
        let script = self.script(index)?;
        let path = script.path.as_deref().ok_or_else(|| ManagerError::NoPath {
            name: script.name.clone(),
        })?;
        write_source(path, &script.source)
    }

    /// Writes the script to `path` and remembers it for later saves.
    pub fn save_as(&mut self, index: usize, path: impl AsRef<Path>) -> Result<(), ManagerError> {
        let path = path.as_ref();
        let script = self.script_mut(index)?;
        write_source(path, &script.source)?;
        script.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&ActiveScript> {
        self.scripts.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveScript> {
        self.scripts.iter()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    fn check(&self, index: usize) -> Result<(), ManagerError> {
        if index < self.scripts.len() {
            Ok(())
        } else {
            Err(ManagerError::NoSuchScript {
                index,
                len: self.scripts.len(),
            })
        }
    }

    fn script(&self, index: usize) -> Result<&ActiveScript, ManagerError> {
        self.check(index)?;
        Ok(&self.scripts[index])
    }

    fn script_mut(&mut self, index: usize) -> Result<&mut ActiveScript, ManagerError> {
        self.check(index)?;
        Ok(&mut self.scripts[index])
    }
}

fn write_source(path: &Path, source: &str) -> Result<(), ManagerError> {
    fs::write(path, source).map_err(|error| ManagerError::Io {
        path: path.to_path_buf(),
        source: error,
    })?;
    info!(path = %path.display(), "saved script");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Candle;
    use indoc::indoc;

    fn candles() -> Vec<Candle> {
        (0..5)
            .rev()
            .map(|index| {
                let close = index as f64 + 1.0;
                Candle::new(index, close, close, close, close, 10.0)
            })
            .collect()
    }

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pinelet-{}-{test}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn disabled_scripts_yield_placeholders() {
        let mut manager = ScriptManager::new();
        let index = manager.add("Trend", "plot(close)");
        manager.set_enabled(index, false).expect("index exists");

        let outputs = manager.run_all(&candles());
        assert_eq!(outputs[0].title, "Trend");
        assert_eq!(outputs[0].error.as_deref(), Some(DISABLED));

        assert!(manager.toggle(index).expect("index exists"));
        let outputs = manager.run_all(&candles());
        assert!(outputs[0].is_ok());
        assert_eq!(outputs[0].plots.len(), 1);
    }

    #[test]
    fn one_broken_script_does_not_stop_the_others() {
        let mut manager = ScriptManager::new();
        manager.add("Broken", "plot(close");
        manager.add("Fine", "plot(close)");

        let outputs = manager.run_all(&candles());
        assert_eq!(outputs.len(), 2);
        assert!(!outputs[0].is_ok());
        assert!(outputs[1].is_ok());
        assert!(manager.get(1).and_then(ActiveScript::last_output).is_some());
    }

    #[test]
    fn discovers_inputs_and_applies_overrides() {
        let mut manager = ScriptManager::new();
        let index = manager.add(
            "Average",
            indoc! {"
                length = input(3, 'Length')
                plot(sma(close, length))
            "},
        );

        manager.run_all(&candles());
        let script = manager.get(index).expect("script");
        assert_eq!(script.inputs().get("Length"), Some(&3.0));

        manager.set_input(index, "Length", 1.0).expect("index exists");
        let outputs = manager.run_all(&candles());
        assert_eq!(outputs[0].plots[0].values[0], 5.0);
        assert_eq!(outputs[0].inputs[0].value, 1.0);
    }

    #[test]
    fn updating_source_changes_the_next_run() {
        let mut manager = ScriptManager::new();
        let index = manager.add("S", "plot(close)");
        manager.run_all(&candles());
        manager
            .update_source(index, "plot(close * 2)")
            .expect("index exists");
        let outputs = manager.run_all(&candles());
        assert_eq!(outputs[0].plots[0].values[0], 10.0);
        assert_eq!(manager.get(index).expect("script").engine().parse_count(), 2);
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let mut manager = ScriptManager::new();
        let err = manager.remove(0).expect_err("empty list");
        assert_eq!(err.to_string(), "No script at index 0 (there are 0)");
        assert!(manager.save(0).is_err());
    }

    #[test]
    fn load_names_the_script_after_the_file() {
        let dir = scratch_dir("load");
        let path = dir.join("momentum.pine");
        fs::write(&path, "plot(change(close))").expect("write fixture");

        let mut manager = ScriptManager::new();
        let index = manager.load(&path).expect("load");
        let script = manager.get(index).expect("script");
        assert_eq!(script.name(), "momentum");
        assert_eq!(script.path(), Some(path.as_path()));
        assert!(script.is_enabled());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn save_requires_a_path_until_save_as() {
        let dir = scratch_dir("save");
        let path = dir.join("saved.pine");

        let mut manager = ScriptManager::new();
        let index = manager.add("Draft", "plot(open)");
        assert!(matches!(
            manager.save(index),
            Err(ManagerError::NoPath { .. })
        ));

        manager.save_as(index, &path).expect("save as");
        manager.update_source(index, "plot(high)").expect("index exists");
        manager.save(index).expect("save");
        assert_eq!(fs::read_to_string(&path).expect("read back"), "plot(high)");

        let removed = manager.remove(index).expect("remove");
        assert_eq!(removed.source(), "plot(high)");
        assert!(manager.is_empty());

        fs::remove_dir_all(dir).ok();
    }
}
