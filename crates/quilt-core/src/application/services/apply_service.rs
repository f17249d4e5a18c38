//! Apply Service - the fragment interpreter.
//!
//! This service runs a template against a target tree:
//! 1. Resolve the template reference to a source root
//! 2. Seed the dependency ledger from the target manifest
//! 3. Execute the root fragment, recursing into nested `apply` actions
//! 4. Drain the deferred action queue
//!
//! Execution is strictly sequential. Every ephemeral source acquired along
//! the way is held until the run ends and released on every exit path.

use std::path::Path;

use tracing::{debug, error, info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        ports::{CommandRunner, Filesystem, FragmentLoader, SourceResolver},
    },
    domain::{
        Action, Anchor, DeferredQueue, DependencyDeclaration, DependencyLedger, DomainError,
        Fragment, Group, GroupSet, Position, RelativePath, RenderContext, ResolvedSource, RunConfig,
        ScopeKind, TemplateReference,
        anchor,
        dependency::{group_block, manifest_append},
        fragment::{
            APPLICATION_FILE, APPLICATION_SCOPE, ENVIRONMENT_MARKER, INITIALIZERS_DIR, LIB_DIR,
        },
    },
    error::{QuiltError, QuiltResult},
};

use super::primitives::TargetTree;
use super::report::{MutationOutcome, RunFailure, RunReport, SkipReason};

/// Nested `apply` depth at which a fragment tree is considered cyclic.
pub const MAX_APPLY_DEPTH: usize = 32;

/// Main template application service.
pub struct ApplyService {
    resolver: Box<dyn SourceResolver>,
    loader: Box<dyn FragmentLoader>,
    filesystem: Box<dyn Filesystem>,
    runner: Box<dyn CommandRunner>,
}

impl ApplyService {
    /// Create a new apply service with the given adapters.
    pub fn new(
        resolver: Box<dyn SourceResolver>,
        loader: Box<dyn FragmentLoader>,
        filesystem: Box<dyn Filesystem>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            resolver,
            loader,
            filesystem,
            runner,
        }
    }

    /// Apply the template named by `reference` to the tree at `target_root`.
    ///
    /// A source that cannot be resolved aborts the run before anything is
    /// written. Deferred actions only run if the whole fragment tree
    /// succeeded; their failures are collected, not fatal.
    #[instrument(
        skip_all,
        fields(
            reference = %reference,
            target = %target_root.as_ref().display(),
            app = %config.app_name()
        )
    )]
    pub fn apply(
        &self,
        reference: &TemplateReference,
        target_root: impl AsRef<Path>,
        config: &RunConfig,
    ) -> Result<RunReport, RunFailure> {
        let target_root = target_root.as_ref();
        let mut run = Run::new(self, target_root, config);

        let source = match self.resolver.resolve(reference) {
            Ok(source) => source,
            Err(e) => return run.finish(Err(e)),
        };
        info!(root = %source.root().display(), ephemeral = source.is_ephemeral(), "Template source resolved");

        let result = run.seed_ledger().and_then(|()| {
            let fragment = self.loader.load(&source.entry_path())?;
            run.execute_fragment(&fragment, source.root())
        });
        run.finish(result)
    }

    /// Execute an already-loaded fragment whose files live under `source_root`.
    #[instrument(skip_all, fields(target = %target_root.as_ref().display()))]
    pub fn execute(
        &self,
        fragment: &Fragment,
        source_root: &Path,
        target_root: impl AsRef<Path>,
        config: &RunConfig,
    ) -> Result<RunReport, RunFailure> {
        let mut run = Run::new(self, target_root.as_ref(), config);
        let result = run
            .seed_ledger()
            .and_then(|()| run.execute_fragment(fragment, source_root));
        run.finish(result)
    }
}

/// Mutable state of a single run.
struct Run<'s> {
    service: &'s ApplyService,
    target: &'s Path,
    config: &'s RunConfig,
    context: RenderContext,
    ledger: DependencyLedger,
    deferred: DeferredQueue,
    leases: Vec<ResolvedSource>,
    report: RunReport,
    depth: usize,
}

impl<'s> Run<'s> {
    fn new(service: &'s ApplyService, target: &'s Path, config: &'s RunConfig) -> Self {
        Self {
            service,
            target,
            config,
            context: RenderContext::from_config(config),
            ledger: DependencyLedger::new(),
            deferred: DeferredQueue::new(),
            leases: Vec::new(),
            report: RunReport::new(),
            depth: 0,
        }
    }

    fn tree(&self) -> TargetTree<'s> {
        TargetTree::new(self.service.filesystem.as_ref(), self.target)
    }

    fn seed_ledger(&mut self) -> QuiltResult<()> {
        let manifest = RelativePath::try_new(self.config.manifest())?;
        let tree = self.tree();
        let ledger = if tree.exists(&manifest) {
            DependencyLedger::seed(&tree.read(&manifest)?)
        } else {
            debug!(manifest = %manifest, "no manifest, starting with an empty ledger");
            DependencyLedger::new()
        };
        self.ledger = ledger;
        Ok(())
    }

    fn finish(mut self, result: QuiltResult<()>) -> Result<RunReport, RunFailure> {
        let outcome = match result {
            Ok(()) => {
                let failures = self.drain_deferred();
                if failures.is_empty() {
                    info!(
                        applied = self.report.applied,
                        skipped = self.report.skipped,
                        "Run completed successfully"
                    );
                    Ok(self.report)
                } else {
                    warn!(failures = failures.len(), "Run completed with deferred failures");
                    Err(RunFailure::new(failures, self.report))
                }
            }
            Err(e) => {
                error!(error = %e, "Run aborted");
                Err(RunFailure::new(vec![e], self.report))
            }
        };
        debug!(released = self.leases.len(), "releasing nested sources");
        outcome
    }

    fn drain_deferred(&mut self) -> Vec<QuiltError> {
        let mut failures = Vec::new();
        while let Some(item) = self.deferred.pop() {
            info!(ordinal = item.ordinal(), label = %item.describe(), "Running deferred action");
            let result = item
                .actions()
                .iter()
                .try_for_each(|action| self.execute_action(action, item.source_root()));
            self.report.deferred_executed += 1;

            if let Err(e) = result {
                warn!(ordinal = item.ordinal(), error = %e, "Deferred action failed");
                failures.push(
                    ApplicationError::DeferredActionFailed {
                        ordinal: item.ordinal(),
                        label: item.describe(),
                        reason: e.to_string(),
                    }
                    .into(),
                );
            }
        }
        failures
    }

    fn execute_fragment(&mut self, fragment: &Fragment, source_root: &Path) -> QuiltResult<()> {
        fragment.validate()?;
        info!(
            fragment = fragment.name().unwrap_or("<unnamed>"),
            actions = fragment.actions.len(),
            depth = self.depth,
            "Applying fragment"
        );
        fragment
            .actions
            .iter()
            .try_for_each(|action| self.execute_action(action, source_root))
    }

    fn execute_action(&mut self, action: &Action, source_root: &Path) -> QuiltResult<()> {
        let step = action.to_string();
        let tree = self.tree();

        match action {
            Action::CreateFile {
                path,
                content,
                mode,
                indent,
            } => {
                let path = self.target_path(path)?;
                let content = self.render_content(content, *indent);
                let outcome = tree.create_file(&path, &content, *mode)?;
                self.record(step, outcome);
            }
            Action::AppendFile {
                path,
                content,
                indent,
            } => {
                let path = self.target_path(path)?;
                let content = self.render_content(content, *indent);
                let outcome = tree.append_file(&path, &content)?;
                self.record(step, outcome);
            }
            Action::Insert {
                path,
                after,
                before,
                regex,
                content,
                indent,
            } => {
                let path = self.target_path(path)?;
                let (marker, position) = match (after, before) {
                    (Some(m), None) => (m, Position::After),
                    (None, Some(m)) => (m, Position::Before),
                    _ => {
                        return Err(DomainError::InvalidFragment(format!(
                            "insert into '{path}' needs exactly one of 'after' or 'before'"
                        ))
                        .into());
                    }
                };
                let anchor = Anchor::text(&self.context.render(marker), *regex)?;
                let content = self.render_content(content, *indent);
                let outcome = tree.insert_relative(&path, &anchor, position, &content)?;
                self.record(step, outcome);
            }
            Action::Substitute {
                path,
                pattern,
                replacement,
                regex,
            } => {
                let path = self.target_path(path)?;
                let anchor = Anchor::text(&self.context.render(pattern), *regex)?;
                let replacement = self.context.render(replacement);
                let outcome = tree.substitute(&path, &anchor, &replacement)?;
                self.record(step, outcome);
            }
            Action::InjectScope {
                path,
                scope,
                kind,
                content,
            } => {
                let path = self.target_path(path)?;
                let scope = self.context.render(scope);
                let content = self.context.render(content);
                let outcome = tree.inject_scope(&path, &scope, *kind, &content)?;
                self.record(step, outcome);
            }
            Action::CopyFile {
                source,
                destination,
                mode,
            } => {
                let (source, destination) = self.copy_paths(source, destination.as_deref())?;
                let outcome = tree.copy_verbatim(&source.under(source_root), &destination, *mode)?;
                self.record(step, outcome);
            }
            Action::CopyDirectory {
                source,
                destination,
                mode,
            } => {
                let (source, destination) = self.copy_paths(source, destination.as_deref())?;
                let copied = tree.copy_directory(&source.under(source_root), &destination, *mode)?;
                for (file, outcome) in copied {
                    self.record(format!("copy-file {file}"), outcome);
                }
            }
            Action::Initializer {
                name,
                content,
                mode,
            } => {
                let path = RelativePath::try_new(INITIALIZERS_DIR)?.join(self.context.render(name))?;
                let outcome = tree.create_file(&path, &self.context.render(content), *mode)?;
                self.record(step, outcome);
            }
            Action::Lib {
                name,
                content,
                mode,
            } => {
                let path = RelativePath::try_new(LIB_DIR)?.join(self.context.render(name))?;
                let outcome = tree.create_file(&path, &self.context.render(content), *mode)?;
                self.record(step, outcome);
            }
            Action::Environment { content, env } => {
                let content = self.context.render(content);
                let outcome = match env {
                    None => tree.inject_scope(
                        &RelativePath::try_new(APPLICATION_FILE)?,
                        APPLICATION_SCOPE,
                        ScopeKind::Class,
                        &content,
                    )?,
                    Some(env) => {
                        let path = RelativePath::try_new(format!("config/environments/{env}.rb"))?;
                        let body = anchor::indent_lines(&anchor::dedent(&content), "  ");
                        tree.insert_relative(
                            &path,
                            &Anchor::literal(ENVIRONMENT_MARKER),
                            Position::After,
                            &body,
                        )?
                    }
                };
                self.record(step, outcome);
            }
            Action::AddDependency {
                name,
                version,
                group,
            } => {
                let decl = DependencyDeclaration::new(self.context.render(name))
                    .in_group(*group)
                    .with_version(version.as_deref().map(|v| self.context.render(v)));
                let groups = decl.groups.clone();
                let outcome = self.declare(vec![decl], &groups)?;
                self.record(step, outcome);
            }
            Action::DependencyGroup { groups, packages } => {
                let groups: GroupSet = groups
                    .iter()
                    .copied()
                    .filter(|g| *g != Group::Default)
                    .collect();
                let decls = packages
                    .iter()
                    .map(|p| DependencyDeclaration {
                        name: self.context.render(&p.name),
                        groups: groups.clone(),
                        version: None,
                    }
                    .with_version(p.version.as_deref().map(|v| self.context.render(v))))
                    .collect();
                let outcome = self.declare(decls, &groups)?;
                self.record(step, outcome);
            }
            Action::When { option, .. } => {
                let value = self.config.option(option);
                let branch = action.branch(value).unwrap_or_default();
                debug!(option = %option, value = ?value, actions = branch.len(), "Conditional evaluated");
                branch
                    .iter()
                    .try_for_each(|nested| self.execute_action(nested, source_root))?;
            }
            Action::Apply { source, entry } => {
                self.apply_nested(source, entry.as_deref(), source_root)?;
            }
            Action::Defer { actions, label } => {
                let ordinal = self
                    .deferred
                    .register(label.clone(), actions.clone(), source_root);
                debug!(ordinal, "Deferred action registered");
            }
            Action::Run { program, args, .. } => {
                let program = self.context.render(program);
                let args: Vec<String> = args.iter().map(|a| self.context.render(a)).collect();
                self.service.runner.run(&program, &args, self.target)?;

                let line = std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.report.commands.push(line);
                self.record(step, MutationOutcome::Applied);
            }
        }
        Ok(())
    }

    fn apply_nested(
        &mut self,
        source: &str,
        entry: Option<&str>,
        parent_root: &Path,
    ) -> QuiltResult<()> {
        if self.depth >= MAX_APPLY_DEPTH {
            return Err(DomainError::InvalidFragment(format!(
                "apply of '{source}' nests deeper than {MAX_APPLY_DEPTH} levels"
            ))
            .into());
        }

        let mut reference =
            TemplateReference::parse(&self.context.render(source))?.relative_to(parent_root);
        if let Some(entry) = entry {
            reference = reference.with_entry(self.context.render(entry));
        }

        let resolved = self.service.resolver.resolve(&reference)?;
        let fragment = self.service.loader.load(&resolved.entry_path())?;
        let root = resolved.root().to_path_buf();
        self.leases.push(resolved);

        self.depth += 1;
        let result = self.execute_fragment(&fragment, &root);
        self.depth -= 1;
        result
    }

    /// Write the declarations the ledger has not seen to the manifest.
    ///
    /// The ledger only learns the new names once the write succeeded, so a
    /// failed write does not hide the package from a later declaration.
    fn declare(
        &mut self,
        decls: Vec<DependencyDeclaration>,
        groups: &GroupSet,
    ) -> QuiltResult<MutationOutcome> {
        let manifest = RelativePath::try_new(self.config.manifest())?;
        let tree = self.tree();
        let current = tree.read(&manifest)?;

        let mut staged = self.ledger.clone();
        let fresh: Vec<DependencyDeclaration> =
            decls.into_iter().filter(|d| staged.declare(d)).collect();
        if fresh.is_empty() {
            return Ok(MutationOutcome::Skipped(SkipReason::AlreadyPresent));
        }

        let text = if groups.is_empty() {
            let lines = fresh
                .iter()
                .map(DependencyDeclaration::manifest_line)
                .collect::<Vec<_>>()
                .join("\n");
            manifest_append(&current, &lines)
        } else {
            group_block(groups, &fresh)
        };
        tree.append_file(&manifest, &text)?;
        self.ledger = staged;

        for decl in fresh {
            info!(package = %decl.name, "Dependency added");
            self.report.dependencies_added.push(decl.name);
        }
        Ok(MutationOutcome::Applied)
    }

    fn record(&mut self, step: String, outcome: MutationOutcome) {
        debug!(step = %step, ?outcome, "Action executed");
        self.report.record(step, outcome);
    }

    fn target_path(&self, raw: &str) -> QuiltResult<RelativePath> {
        Ok(RelativePath::try_new(self.context.render(raw))?)
    }

    fn copy_paths(
        &self,
        source: &str,
        destination: Option<&str>,
    ) -> QuiltResult<(RelativePath, RelativePath)> {
        let source = self.target_path(source)?;
        let destination = match destination {
            Some(d) => self.target_path(d)?,
            None => source.clone(),
        };
        Ok((source, destination))
    }

    fn render_content(&self, content: &str, indent: Option<usize>) -> String {
        let rendered = self.context.render(content);
        match indent {
            Some(width) if width > 0 => anchor::indent(&rendered, width),
            _ => rendered,
        }
    }
}
