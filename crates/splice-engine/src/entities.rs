//! Transformable entities and the function chains linking them.
//!
//! Items and transformer functions are both [`Transformable`]: each owns a
//! chain of the functions targeting it, kept sorted by [`ChainOrder`]. The
//! chain is a doubly linked list threaded through the functions, stored in
//! arenas and addressed by generation-checked ids.

use std::fmt;

use camino::Utf8PathBuf;
use splice_syntax::{Arena, Id, SourceCode, SupportedLanguage};

use crate::language::Language;
use crate::resources::{PackageId, PackageResources, ResourceLocator};
use crate::transformer::Declaration;

/// Handle of an [`Item`].
pub type ItemId = Id<Item>;
/// Handle of a [`FunctionSource`].
pub type SourceId = Id<FunctionSource>;
/// Handle of a [`TFunction`].
pub type FunctionId = Id<TFunction>;

/// Something a transformer function can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetRef {
    /// A final item.
    Item(ItemId),
    /// Another transformer function.
    Function(FunctionId),
}

/// A tracked, file-backed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputId {
    /// An item.
    Item(ItemId),
    /// A function source.
    Source(SourceId),
}

/// Where an entity's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    package: PackageId,
    locator: ResourceLocator,
    full_path: Option<Utf8PathBuf>,
    local: bool,
    text: String,
}

impl Origin {
    /// Records the origin of a resource read from `package`.
    #[must_use]
    pub fn new(package: &PackageResources, locator: ResourceLocator, text: String) -> Self {
        Self {
            package: package.id().clone(),
            full_path: package.full_path_of(&locator),
            local: package.is_local(),
            locator,
            text,
        }
    }

    /// The owning package.
    #[must_use]
    pub const fn package(&self) -> &PackageId {
        &self.package
    }

    /// The resource within the package.
    #[must_use]
    pub const fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Absolute path of the backing file, when known.
    #[must_use]
    pub fn full_path(&self) -> Option<&Utf8PathBuf> {
        self.full_path.as_ref()
    }

    /// Returns `true` for watched, mutable resources.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.local
    }

    /// The resource text as last read.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `package:path` label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.package, self.locator)
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

/// First and last function of a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionChain {
    first: Option<FunctionId>,
    last: Option<FunctionId>,
}

impl FunctionChain {
    /// Returns `true` when no function is chained.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// Capability shared by items and functions: owning a function chain.
pub trait Transformable {
    /// The chain of functions applied to this target.
    fn chain(&self) -> &FunctionChain;

    /// Name shown in diagnostics: a target path or a function name.
    fn display_name(&self) -> &str;

    /// First function applied.
    fn first_function(&self) -> Option<FunctionId> {
        self.chain().first
    }

    /// Last function applied.
    fn last_function(&self) -> Option<FunctionId> {
        self.chain().last
    }
}

/// Position of a function within a chain: package rank, then resource
/// name, then declaration index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChainOrder {
    rank: usize,
    resource: String,
    index: usize,
}

impl ChainOrder {
    /// Creates an order key.
    #[must_use]
    pub fn new(rank: usize, resource: impl Into<String>, index: usize) -> Self {
        Self {
            rank,
            resource: resource.into(),
            index,
        }
    }
}

/// Prev/next links of an input within its tracker bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InputLinks {
    pub(crate) prev: Option<InputId>,
    pub(crate) next: Option<InputId>,
}

/// A final transformation target.
#[derive(Debug, Clone)]
pub struct Item {
    origin: Origin,
    language: SupportedLanguage,
    target_path: String,
    code: SourceCode,
    parsed: bool,
    chain: FunctionChain,
    pub(crate) links: InputLinks,
}

impl Item {
    pub(crate) fn new(
        origin: Origin,
        language: SupportedLanguage,
        target_path: String,
        code: SourceCode,
        parsed: bool,
    ) -> Self {
        Self {
            origin,
            language,
            target_path,
            code,
            parsed,
            chain: FunctionChain::default(),
            links: InputLinks::default(),
        }
    }

    /// Where the item came from.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The item's language.
    #[must_use]
    pub const fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Final path the item is installed to.
    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// The analysed source.
    #[must_use]
    pub const fn code(&self) -> &SourceCode {
        &self.code
    }

    /// Returns `false` when the text did not parse and `code` is lexical.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub(crate) fn update(&mut self, text: String, code: SourceCode, parsed: bool) {
        self.origin.set_text(text);
        self.code = code;
        self.parsed = parsed;
    }

    pub(crate) const fn chain_mut(&mut self) -> &mut FunctionChain {
        &mut self.chain
    }
}

impl Transformable for Item {
    fn chain(&self) -> &FunctionChain {
        &self.chain
    }

    fn display_name(&self) -> &str {
        &self.target_path
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_path)
    }
}

/// A resource declaring transformer functions.
#[derive(Debug, Clone)]
pub struct FunctionSource {
    origin: Origin,
    source_name: String,
    hint: Option<SupportedLanguage>,
    pub(crate) functions: Vec<FunctionId>,
    pub(crate) parsed: bool,
    pub(crate) unresolved: bool,
    pub(crate) links: InputLinks,
}

impl FunctionSource {
    pub(crate) const fn new(
        origin: Origin,
        source_name: String,
        hint: Option<SupportedLanguage>,
    ) -> Self {
        Self {
            origin,
            source_name,
            hint,
            functions: Vec::new(),
            parsed: false,
            unresolved: false,
            links: InputLinks {
                prev: None,
                next: None,
            },
        }
    }

    /// Where the source came from.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// File name without transformer suffix and language hint.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Language hint from the file name.
    #[must_use]
    pub const fn hint(&self) -> Option<SupportedLanguage> {
        self.hint
    }

    /// Declared functions in source order.
    #[must_use]
    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }

    /// Returns `false` when the text did not parse.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Returns `true` while some function has no resolved target.
    #[must_use]
    pub const fn has_unresolved(&self) -> bool {
        self.unresolved
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.origin.set_text(text);
    }
}

/// One transformer function bound to at most one target.
#[derive(Debug, Clone)]
pub struct TFunction {
    source: SourceId,
    package: PackageId,
    name: String,
    language: Language,
    declaration: Declaration,
    order: ChainOrder,
    target: Option<TargetRef>,
    chain: FunctionChain,
    prev: Option<FunctionId>,
    next: Option<FunctionId>,
}

impl TFunction {
    pub(crate) const fn new(
        source: SourceId,
        package: PackageId,
        name: String,
        language: Language,
        declaration: Declaration,
        order: ChainOrder,
    ) -> Self {
        Self {
            source,
            package,
            name,
            language,
            declaration,
            order,
            target: None,
            chain: FunctionChain {
                first: None,
                last: None,
            },
            prev: None,
            next: None,
        }
    }

    /// The declaring source.
    #[must_use]
    pub const fn source(&self) -> SourceId {
        self.source
    }

    /// Package of the declaring source.
    #[must_use]
    pub const fn package(&self) -> &PackageId {
        &self.package
    }

    /// Unique function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Language of the function's target.
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// The parsed declaration.
    #[must_use]
    pub const fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// The declared target string, if any.
    #[must_use]
    pub fn declared_target(&self) -> Option<&str> {
        self.declaration.target()
    }

    /// The resolved target, once resolution succeeded.
    #[must_use]
    pub const fn target(&self) -> Option<TargetRef> {
        self.target
    }

    /// Previous function in the target's chain.
    #[must_use]
    pub const fn prev_function(&self) -> Option<FunctionId> {
        self.prev
    }

    /// Next function in the target's chain.
    #[must_use]
    pub const fn next_function(&self) -> Option<FunctionId> {
        self.next
    }

    pub(crate) const fn chain_mut(&mut self) -> &mut FunctionChain {
        &mut self.chain
    }
}

impl Transformable for TFunction {
    fn chain(&self) -> &FunctionChain {
        &self.chain
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Arena storage for every entity, plus chain maintenance.
#[derive(Debug, Default)]
pub(crate) struct Entities {
    pub(crate) items: Arena<Item>,
    pub(crate) sources: Arena<FunctionSource>,
    pub(crate) functions: Arena<TFunction>,
}

impl Entities {
    pub(crate) fn transformable(&self, target: TargetRef) -> Option<&dyn Transformable> {
        match target {
            TargetRef::Item(id) => self.items.get(id).map(|item| item as &dyn Transformable),
            TargetRef::Function(id) => self
                .functions
                .get(id)
                .map(|function| function as &dyn Transformable),
        }
    }

    fn chain_mut(&mut self, target: TargetRef) -> Option<&mut FunctionChain> {
        match target {
            TargetRef::Item(id) => self.items.get_mut(id).map(Item::chain_mut),
            TargetRef::Function(id) => self.functions.get_mut(id).map(TFunction::chain_mut),
        }
    }

    /// Functions chained on `target`, first to last.
    pub(crate) fn chain_of(&self, target: TargetRef) -> ChainIter<'_> {
        ChainIter {
            functions: &self.functions,
            next: self.transformable(target).and_then(Transformable::first_function),
        }
    }

    /// The function after which one ordered by `order` belongs, or `None`
    /// when it belongs first.
    pub(crate) fn insertion_point(&self, target: TargetRef, order: &ChainOrder) -> Option<FunctionId> {
        let mut cursor = self.transformable(target)?.last_function();
        while let Some(id) = cursor {
            let function = self.functions.get(id)?;
            if function.order <= *order {
                return Some(id);
            }
            cursor = function.prev;
        }
        None
    }

    /// Binds `id` to `target` and splices it into the target's chain.
    pub(crate) fn link(&mut self, id: FunctionId, target: TargetRef) -> bool {
        let Some(order) = self.functions.get(id).map(|f| f.order.clone()) else {
            return false;
        };
        let Some(first) = self.transformable(target).map(Transformable::first_function) else {
            return false;
        };
        let after = self.insertion_point(target, &order);
        let before = after.map_or(first, |prev| self.functions.get(prev).and_then(|f| f.next));
        if let Some(function) = self.functions.get_mut(id) {
            function.target = Some(target);
            function.prev = after;
            function.next = before;
        }
        match after.and_then(|prev| self.functions.get_mut(prev)) {
            Some(prev) => prev.next = Some(id),
            None => {
                if let Some(chain) = self.chain_mut(target) {
                    chain.first = Some(id);
                }
            }
        }
        match before.and_then(|next| self.functions.get_mut(next)) {
            Some(next) => next.prev = Some(id),
            None => {
                if let Some(chain) = self.chain_mut(target) {
                    chain.last = Some(id);
                }
            }
        }
        true
    }

    /// Removes `id` from its target's chain, returning the old target.
    pub(crate) fn unlink(&mut self, id: FunctionId) -> Option<TargetRef> {
        let function = self.functions.get_mut(id)?;
        let target = function.target.take()?;
        let prev = function.prev.take();
        let next = function.next.take();
        match prev.and_then(|p| self.functions.get_mut(p)) {
            Some(p) => p.next = next,
            None => {
                if let Some(chain) = self.chain_mut(target) {
                    chain.first = next;
                }
            }
        }
        match next.and_then(|n| self.functions.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => {
                if let Some(chain) = self.chain_mut(target) {
                    chain.last = prev;
                }
            }
        }
        Some(target)
    }

    /// Item at the end of the target chain starting at `target`.
    pub(crate) fn root_item(&self, target: TargetRef) -> Option<ItemId> {
        let mut cursor = target;
        for _ in 0..=self.functions.len() {
            match cursor {
                TargetRef::Item(id) => return self.items.contains(id).then_some(id),
                TargetRef::Function(id) => cursor = self.functions.get(id)?.target?,
            }
        }
        None
    }

    pub(crate) fn origin(&self, input: InputId) -> Option<&Origin> {
        match input {
            InputId::Item(id) => self.items.get(id).map(Item::origin),
            InputId::Source(id) => self.sources.get(id).map(FunctionSource::origin),
        }
    }

    pub(crate) fn links(&self, input: InputId) -> Option<InputLinks> {
        match input {
            InputId::Item(id) => self.items.get(id).map(|item| item.links),
            InputId::Source(id) => self.sources.get(id).map(|source| source.links),
        }
    }

    pub(crate) fn links_mut(&mut self, input: InputId) -> Option<&mut InputLinks> {
        match input {
            InputId::Item(id) => self.items.get_mut(id).map(|item| &mut item.links),
            InputId::Source(id) => self.sources.get_mut(id).map(|source| &mut source.links),
        }
    }
}

/// Iterator over a function chain.
#[derive(Debug, Clone)]
pub struct ChainIter<'a> {
    functions: &'a Arena<TFunction>,
    next: Option<FunctionId>,
}

impl Iterator for ChainIter<'_> {
    type Item = FunctionId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.functions.get(current).and_then(|f| f.next);
        Some(current)
    }
}
