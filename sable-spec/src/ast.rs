//! # Program Model
//!
//! A program owns its packages, an operand-descriptor arena, the flat
//! memory buffer, and the call stack. Everything that crosses an
//! ownership boundary (package imports, operator references, struct
//! back-references, shared operand descriptors) is a typed index into
//! those arenas, never an owning pointer, so cyclic imports and
//! descriptor sharing have the same representation in memory as in a
//! serialized image.
//!
//! Memory is a single contiguous byte buffer in three fixed segments:
//! stack `[0, stack_size)`, data `[stack_size, heap_start)`, heap
//! `[heap_start, heap_start + heap_size)`. The data segment is written
//! only while building (literal and global emission); the stack moves
//! with call frames; the heap is bump-allocated at run time.

use crate::config::MachineConfig;
use crate::error::SpecError;
use crate::opcode::Opcode;
use crate::types::{DeclSpecifier, DerefOp, PassBy, TypeCode};
use crate::{NULL_HEAP_ADDRESS_OFFSET, OBJECT_HEADER_SIZE, POINTER_SIZE, STR_HEADER_SIZE};
use serde::{Deserialize, Serialize};

/// Name of the entry package.
pub const MAIN_PACKAGE: &str = "main";
/// Name of the entry function.
pub const MAIN_FUNCTION: &str = "main";
/// Name of the synthesized global-initializer function.
pub const INIT_FUNCTION: &str = "*init";

/// Index of a package in `Program::packages`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PkgId(pub u32);

/// Index of an operand descriptor in `Program::args`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgId(pub u32);

/// Two-level index of a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunRef {
    pub pkg: PkgId,
    pub fun: u32,
}

/// Two-level index of a struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructRef {
    pub pkg: PkgId,
    pub strct: u32,
}

/// An expression's operator: a native opcode or a user-defined function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Native(Opcode),
    Defined(FunRef),
}

/// Lexical block boundary marker carried on expressions. Structural
/// metadata only; never moves the instruction pointer by itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeOp {
    #[default]
    None,
    Open,
    Close,
}

impl ScopeOp {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(ScopeOp::None),
            1 => Some(ScopeOp::Open),
            -1 => Some(ScopeOp::Close),
            _ => None,
        }
    }

    pub fn to_i8(self) -> i8 {
        match self {
            ScopeOp::None => 0,
            ScopeOp::Open => 1,
            ScopeOp::Close => -1,
        }
    }
}

/// Expression-level flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprTags {
    pub method_call: bool,
    pub struct_literal: bool,
    pub array_literal: bool,
    pub break_loop: bool,
    pub continue_loop: bool,
    pub und_type: bool,
}

/// One statement. Everything in the language is an expression, control
/// flow included; `then_lines`/`else_lines` are jump distances relative
/// to this expression's index within its function.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Expression {
    pub inputs: Vec<ArgId>,
    pub outputs: Vec<ArgId>,
    /// `None` for pure-data expressions such as literals and declarations.
    pub operator: Option<Operator>,
    /// Jump target label, when this expression is a label anchor.
    pub label: String,
    pub scope_op: ScopeOp,
    pub tags: ExprTags,
    pub then_lines: i32,
    pub else_lines: i32,
    pub file: String,
    pub line: usize,
}

impl Expression {
    pub fn native(op: Opcode) -> Self {
        Self {
            operator: Some(Operator::Native(op)),
            ..Default::default()
        }
    }

    pub fn call(fun: FunRef) -> Self {
        Self {
            operator: Some(Operator::Defined(fun)),
            ..Default::default()
        }
    }

    /// A pure-data expression (declaration, literal anchor).
    pub fn data() -> Self {
        Self::default()
    }

    pub fn with_inputs(mut self, inputs: Vec<ArgId>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<ArgId>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_jumps(mut self, then_lines: i32, else_lines: i32) -> Self {
        self.then_lines = then_lines;
        self.else_lines = else_lines;
        self
    }
}

/// Boolean tag block of an operand descriptor. Several of these are
/// derivable from the specifier chain; they are kept because the hot
/// paths consume them directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgTags {
    pub slice: bool,
    pub array: bool,
    /// Combined pointer+index chain: index applies before the pointer.
    pub array_first: bool,
    pub pointer: bool,
    pub reference: bool,
    /// Combined pointer+index chain: pointer applies before the index.
    pub dereference_first: bool,
    pub strct: bool,
    /// `pkg.var`: this operand names the global on the far side of the dot.
    pub rest: bool,
    pub local_declaration: bool,
    pub short_declaration: bool,
    /// `&slice[0]`, `&struct.field`.
    pub inner_reference: bool,
    pub previously_declared: bool,
    pub escapes: bool,
}

/// Operand descriptor: where and how a value lives in memory. Every
/// field is fixed at build time; descriptors are immutable once their
/// function is added to a package and may be shared between expressions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Argument {
    /// Per-dimension sizes for arrays. For slices only the dimension
    /// count matters; the entries are zero sentinels.
    pub lengths: Vec<usize>,
    /// Compound type chain, stored in source reading order.
    pub decl_specifiers: Vec<DeclSpecifier>,
    /// Dereference chain consumed while computing the runtime offset.
    pub deref_operations: Vec<DerefOp>,
    /// Sub-operands whose values index into this one.
    pub indexes: Vec<ArgId>,
    /// Sub-operands naming struct-field selectors, in selection order.
    pub fields: Vec<ArgId>,
    /// Input parameters when this operand is a first-class function value.
    pub inputs: Vec<ArgId>,
    /// Output parameters when this operand is a first-class function value.
    pub outputs: Vec<ArgId>,
    /// Empty for literals.
    pub name: String,
    pub type_code: TypeCode,
    /// Size of the basic element in bytes.
    pub size: usize,
    /// Total bytes referenced: `size * ∏ lengths` for arrays, the
    /// pointer width for heap-indirected values.
    pub total_size: usize,
    /// Frame-relative when below the stack size, absolute otherwise.
    pub offset: usize,
    pub indirection_levels: u8,
    pub dereference_levels: u8,
    pub pass_by: PassBy,
    pub custom_type: Option<StructRef>,
    pub pkg: Option<PkgId>,
    pub tags: ArgTags,
    pub file: String,
    pub line: usize,
}

impl Argument {
    /// A named scalar of the given primitive type.
    pub fn new(name: &str, type_code: TypeCode) -> Self {
        let size = type_code.size();
        Self {
            name: name.to_string(),
            type_code,
            size,
            total_size: size,
            decl_specifiers: vec![DeclSpecifier::Basic],
            ..Default::default()
        }
    }

    /// A slice of `elem` elements. The variable itself is one reference
    /// wide; element size is carried for indexing and appends.
    pub fn slice_of(name: &str, elem: TypeCode) -> Self {
        let mut arg = Self::new(name, elem);
        arg.lengths = vec![0];
        arg.size = elem.size();
        arg.total_size = POINTER_SIZE;
        arg.decl_specifiers = vec![DeclSpecifier::Slice, DeclSpecifier::Basic];
        arg.tags.slice = true;
        arg
    }

    /// An in-place array of `elem` with the given dimensions.
    pub fn array_of(name: &str, elem: TypeCode, lengths: Vec<usize>) -> Self {
        let mut arg = Self::new(name, elem);
        arg.total_size = crate::types::array_total_size(elem.size(), &lengths);
        arg.lengths = lengths;
        arg.decl_specifiers = vec![DeclSpecifier::Array, DeclSpecifier::Basic];
        arg.tags.array = true;
        arg
    }

    /// A struct instance of `custom`, stored in place.
    pub fn struct_of(name: &str, custom: StructRef, size: usize) -> Self {
        let mut arg = Self::new(name, TypeCode::Custom);
        arg.size = size;
        arg.total_size = size;
        arg.decl_specifiers = vec![DeclSpecifier::Struct];
        arg.custom_type = Some(custom);
        arg.tags.strct = true;
        arg
    }

    /// A pointer to a struct instance on the heap.
    pub fn pointer_to(name: &str, custom: StructRef) -> Self {
        let mut arg = Self::new(name, TypeCode::Pointer);
        arg.decl_specifiers = vec![DeclSpecifier::Pointer, DeclSpecifier::Struct];
        arg.custom_type = Some(custom);
        arg.indirection_levels = 1;
        arg.tags.pointer = true;
        arg
    }

    /// Derived element accessor: this operand with `index` applied.
    pub fn indexed(&self, index: ArgId) -> Self {
        let mut elem = self.clone();
        let op = if self.tags.slice {
            DerefOp::Slice
        } else {
            DerefOp::ArrayIndex
        };
        elem.deref_operations.push(op);
        elem.indexes.push(index);
        elem.dereference_levels += 1;
        elem
    }

    /// Derived field accessor: this operand with `.field` applied.
    pub fn field(&self, selector: ArgId) -> Self {
        let mut sel = self.clone();
        sel.deref_operations.push(DerefOp::Field);
        sel.fields.push(selector);
        sel
    }

    /// Whether values of this operand reach the heap through a 4-byte
    /// reference (GC root candidates).
    pub fn is_heap_reference(&self) -> bool {
        self.type_code.is_indirect()
            || self.tags.slice
            || self.tags.pointer
            || self
                .decl_specifiers
                .iter()
                .any(|d| matches!(d, DeclSpecifier::Pointer | DeclSpecifier::Slice))
    }
}

/// One call record: the function being executed, its program counter,
/// and the byte offset of its frame in the stack segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    pub operator: FunRef,
    pub line: usize,
    pub frame_pointer: usize,
}

/// A named function. Native functions carry an opcode and no body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub pkg: PkgId,
    pub is_native: bool,
    pub opcode: Option<Opcode>,
    pub inputs: Vec<ArgId>,
    pub outputs: Vec<ArgId>,
    pub expressions: Vec<Expression>,
    /// Expression count, pre-computed.
    pub length: usize,
    /// Automatic-memory frame size in bytes.
    pub size: usize,
    /// Declared heap-reference operands; the collector's roots for
    /// frames of this function.
    pub list_of_pointers: Vec<ArgId>,
    pub file: String,
    pub line: usize,
}

impl Function {
    pub fn new(name: &str, pkg: PkgId) -> Self {
        Self {
            name: name.to_string(),
            pkg,
            is_native: false,
            opcode: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            expressions: Vec::new(),
            length: 0,
            size: 0,
            list_of_pointers: Vec::new(),
            file: String::new(),
            line: 0,
        }
    }

    pub fn native(name: &str, pkg: PkgId, opcode: Opcode) -> Self {
        let mut fun = Self::new(name, pkg);
        fun.is_native = true;
        fun.opcode = Some(opcode);
        fun
    }

    pub fn expression_by_label(&self, label: &str) -> Option<usize> {
        self.expressions.iter().position(|e| e.label == label)
    }
}

/// A named struct with pre-packed field layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    pub pkg: PkgId,
    /// Packed size: the sum of field total sizes.
    pub size: usize,
    pub fields: Vec<ArgId>,
}

/// A named package: imports, structs, functions, and globals. Imports
/// are non-owning; the program's package list is the single owner, so
/// import cycles are fine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub imports: Vec<PkgId>,
    pub structs: Vec<Struct>,
    pub functions: Vec<Function>,
    pub globals: Vec<ArgId>,
    /// Builder cursor.
    pub current_function: Option<u32>,
    /// Builder cursor.
    pub current_struct: Option<u32>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            imports: Vec::new(),
            structs: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            current_function: None,
            current_struct: None,
        }
    }
}

/// A full program: the compile-time representation and the runtime
/// state are the same value, which is what makes mid-execution
/// snapshots possible.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub path: String,
    pub version: String,

    pub packages: Vec<Package>,
    /// Operand-descriptor arena; all `ArgId`s index here.
    pub args: Vec<Argument>,
    /// OS input arguments.
    pub inputs: Vec<ArgId>,
    /// Outputs to the OS.
    pub outputs: Vec<ArgId>,

    pub memory: Vec<u8>,
    pub stack_size: usize,
    /// Byte offset of the next frame's base.
    pub stack_pointer: usize,
    pub data_size: usize,
    pub heap_size: usize,
    /// `stack_size + data_size`.
    pub heap_start: usize,
    /// Heap-relative bump pointer; starts past the reserved nil region.
    pub heap_pointer: usize,

    pub call_stack: Vec<CallFrame>,
    pub call_stack_capacity: usize,
    pub terminated: bool,

    /// Builder/REPL cursor.
    pub current_package: Option<PkgId>,
}

impl Program {
    /// An empty program with stack and heap allocated per `config`.
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            path: String::new(),
            version: crate::VERSION.to_string(),
            packages: Vec::new(),
            args: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            memory: vec![0; config.stack_size + config.init_heap_size],
            stack_size: config.stack_size,
            stack_pointer: 0,
            data_size: 0,
            heap_size: config.init_heap_size,
            heap_start: config.stack_size,
            heap_pointer: NULL_HEAP_ADDRESS_OFFSET,
            call_stack: Vec::new(),
            call_stack_capacity: config.call_stack_capacity,
            terminated: false,
            current_package: None,
        }
    }

    // ------------------------------------------------------------------
    // Arena access

    pub fn arg(&self, id: ArgId) -> &Argument {
        &self.args[id.0 as usize]
    }

    pub fn arg_mut(&mut self, id: ArgId) -> &mut Argument {
        &mut self.args[id.0 as usize]
    }

    pub fn alloc_arg(&mut self, arg: Argument) -> ArgId {
        let id = ArgId(self.args.len() as u32);
        self.args.push(arg);
        id
    }

    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id.0 as usize]
    }

    pub fn package_mut(&mut self, id: PkgId) -> &mut Package {
        &mut self.packages[id.0 as usize]
    }

    pub fn function(&self, fun: FunRef) -> &Function {
        &self.packages[fun.pkg.0 as usize].functions[fun.fun as usize]
    }

    pub fn function_mut(&mut self, fun: FunRef) -> &mut Function {
        &mut self.packages[fun.pkg.0 as usize].functions[fun.fun as usize]
    }

    pub fn strct(&self, sref: StructRef) -> &Struct {
        &self.packages[sref.pkg.0 as usize].structs[sref.strct as usize]
    }

    // ------------------------------------------------------------------
    // Package handling

    /// Add a package, or select it if one with the same name exists.
    pub fn add_package(&mut self, name: &str) -> PkgId {
        if let Some(id) = self.get_package(name) {
            self.current_package = Some(id);
            return id;
        }
        let id = PkgId(self.packages.len() as u32);
        self.packages.push(Package::new(name));
        self.current_package = Some(id);
        id
    }

    pub fn get_package(&self, name: &str) -> Option<PkgId> {
        self.packages
            .iter()
            .position(|p| p.name == name)
            .map(|i| PkgId(i as u32))
    }

    pub fn select_package(&mut self, name: &str) -> Result<PkgId, SpecError> {
        let id = self
            .get_package(name)
            .ok_or_else(|| SpecError::PackageNotFound(name.to_string()))?;
        self.current_package = Some(id);
        Ok(id)
    }

    pub fn current_package(&self) -> Result<PkgId, SpecError> {
        self.current_package.ok_or(SpecError::NoCurrentPackage)
    }

    pub fn add_import(&mut self, pkg: PkgId, imported: PkgId) {
        let imports = &mut self.package_mut(pkg).imports;
        if !imports.contains(&imported) {
            imports.push(imported);
        }
    }

    // ------------------------------------------------------------------
    // Lookups: named package first, then its imports.

    pub fn get_function(&self, name: &str, pkg: PkgId) -> Option<FunRef> {
        let find = |id: PkgId| {
            self.package(id)
                .functions
                .iter()
                .position(|f| f.name == name)
                .map(|i| FunRef { pkg: id, fun: i as u32 })
        };
        find(pkg).or_else(|| self.package(pkg).imports.iter().find_map(|&imp| find(imp)))
    }

    pub fn get_struct(&self, name: &str, pkg: PkgId) -> Option<StructRef> {
        let find = |id: PkgId| {
            self.package(id)
                .structs
                .iter()
                .position(|s| s.name == name)
                .map(|i| StructRef {
                    pkg: id,
                    strct: i as u32,
                })
        };
        find(pkg).or_else(|| self.package(pkg).imports.iter().find_map(|&imp| find(imp)))
    }

    pub fn get_global(&self, name: &str, pkg: PkgId) -> Option<ArgId> {
        let find = |id: PkgId| {
            self.package(id)
                .globals
                .iter()
                .copied()
                .find(|&g| self.arg(g).name == name)
        };
        find(pkg).or_else(|| self.package(pkg).imports.iter().find_map(|&imp| find(imp)))
    }

    /// The entry point, when present.
    pub fn main_function(&self) -> Option<FunRef> {
        let pkg = self.get_package(MAIN_PACKAGE)?;
        self.get_function(MAIN_FUNCTION, pkg)
    }

    // ------------------------------------------------------------------
    // Struct building

    pub fn add_struct(&mut self, pkg: PkgId, name: &str) -> StructRef {
        let p = self.package_mut(pkg);
        if let Some(i) = p.structs.iter().position(|s| s.name == name) {
            p.current_struct = Some(i as u32);
            return StructRef {
                pkg,
                strct: i as u32,
            };
        }
        let idx = p.structs.len() as u32;
        p.structs.push(Struct {
            name: name.to_string(),
            pkg,
            size: 0,
            fields: Vec::new(),
        });
        p.current_struct = Some(idx);
        StructRef { pkg, strct: idx }
    }

    /// Add a field; its offset is the sum of the preceding fields'
    /// total sizes, and the struct's packed size grows by the field's
    /// total size.
    pub fn add_field(&mut self, sref: StructRef, mut field: Argument) -> Result<ArgId, SpecError> {
        let strct_name;
        let offset;
        {
            let s = self.strct(sref);
            strct_name = s.name.clone();
            if s
                .fields
                .iter()
                .any(|&f| self.arg(f).name == field.name)
            {
                return Err(SpecError::DuplicateField {
                    strct: strct_name,
                    field: field.name,
                });
            }
            offset = s.size;
        }
        field.offset = offset;
        field.pkg = Some(sref.pkg);
        let total = field.total_size;
        let id = self.alloc_arg(field);
        let s = &mut self.packages[sref.pkg.0 as usize].structs[sref.strct as usize];
        s.fields.push(id);
        s.size += total;
        Ok(id)
    }

    pub fn get_field(&self, sref: StructRef, name: &str) -> Result<ArgId, SpecError> {
        let s = self.strct(sref);
        s.fields
            .iter()
            .copied()
            .find(|&f| self.arg(f).name == name)
            .ok_or_else(|| SpecError::FieldNotFound {
                strct: s.name.clone(),
                field: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Function building

    pub fn add_function(&mut self, pkg: PkgId, fun: Function) -> FunRef {
        let p = self.package_mut(pkg);
        if let Some(i) = p.functions.iter().position(|f| f.name == fun.name) {
            p.functions[i] = fun;
            p.current_function = Some(i as u32);
            return FunRef { pkg, fun: i as u32 };
        }
        let idx = p.functions.len() as u32;
        p.functions.push(fun);
        p.current_function = Some(idx);
        FunRef { pkg, fun: idx }
    }

    fn declare_in_frame(&mut self, fun: FunRef, mut arg: Argument) -> ArgId {
        arg.pkg = Some(fun.pkg);
        let total = arg.total_size;
        let heap_ref = arg.is_heap_reference();
        let id = self.alloc_arg(arg);
        let offset = self.function(fun).size;
        self.args[id.0 as usize].offset = offset;
        let f = self.function_mut(fun);
        f.size += total;
        if heap_ref {
            f.list_of_pointers.push(id);
        }
        id
    }

    /// Declare an input parameter; frame space is assigned in order.
    pub fn declare_input(&mut self, fun: FunRef, arg: Argument) -> ArgId {
        let id = self.declare_in_frame(fun, arg);
        self.function_mut(fun).inputs.push(id);
        id
    }

    /// Declare an output parameter.
    pub fn declare_output(&mut self, fun: FunRef, arg: Argument) -> ArgId {
        let id = self.declare_in_frame(fun, arg);
        self.function_mut(fun).outputs.push(id);
        id
    }

    /// Declare a local variable.
    pub fn declare_local(&mut self, fun: FunRef, mut arg: Argument) -> ArgId {
        arg.tags.local_declaration = true;
        self.declare_in_frame(fun, arg)
    }

    pub fn add_expression(&mut self, fun: FunRef, mut expr: Expression) -> usize {
        let f = self.function_mut(fun);
        if expr.file.is_empty() {
            expr.file = f.file.clone();
        }
        f.expressions.push(expr);
        f.length = f.expressions.len();
        f.length - 1
    }

    /// Seal a function: recompute the pre-computed expression count.
    /// Frame size and root list are maintained incrementally by the
    /// `declare_*` methods.
    pub fn finish_function(&mut self, fun: FunRef) {
        let f = self.function_mut(fun);
        f.length = f.expressions.len();
    }

    /// Synthesize the entry-point function that runs global
    /// initializers. Idempotent.
    pub fn add_init_function(&mut self) -> FunRef {
        let pkg = self.add_package(MAIN_PACKAGE);
        if let Some(fun) = self.get_function(INIT_FUNCTION, pkg) {
            return fun;
        }
        self.add_function(pkg, Function::new(INIT_FUNCTION, pkg))
    }

    // ------------------------------------------------------------------
    // Data segment emission (build time only)

    /// Append raw bytes to the data segment, shifting the (untouched)
    /// heap right. Returns the absolute offset of the first byte.
    pub fn append_data(&mut self, bytes: &[u8]) -> usize {
        debug_assert_eq!(
            self.heap_pointer, NULL_HEAP_ADDRESS_OFFSET,
            "data emission after heap use"
        );
        let offset = self.heap_start;
        self.memory.splice(offset..offset, bytes.iter().copied());
        self.heap_start += bytes.len();
        self.data_size += bytes.len();
        offset
    }

    /// Reserve zeroed data-segment storage (globals).
    pub fn reserve_data(&mut self, len: usize) -> usize {
        self.append_data(&vec![0u8; len])
    }

    /// Write a string object into the data segment: object header plus
    /// `[len: u32][bytes]` payload. Returns the absolute offset of the
    /// header, which is what a `str` cell stores.
    pub fn write_str_literal(&mut self, s: &str) -> usize {
        let payload = STR_HEADER_SIZE + s.len();
        let mut bytes = Vec::with_capacity(OBJECT_HEADER_SIZE + payload);
        bytes.extend_from_slice(&0u32.to_le_bytes()); // forwarding
        bytes.push(0); // mark
        bytes.extend_from_slice(&((OBJECT_HEADER_SIZE + payload) as u32).to_le_bytes());
        bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
        bytes.extend_from_slice(s.as_bytes());
        self.append_data(&bytes)
    }

    /// Literal descriptor for a string; pass-by-reference so that
    /// assignment copies the object's address.
    pub fn str_literal_arg(&mut self, s: &str) -> ArgId {
        let offset = self.write_str_literal(s);
        let mut arg = Argument::new("", TypeCode::Str);
        arg.offset = offset;
        arg.pass_by = PassBy::Reference;
        self.alloc_arg(arg)
    }

    /// Literal descriptor for a scalar already encoded little-endian.
    pub fn data_literal_arg(&mut self, type_code: TypeCode, bytes: &[u8]) -> ArgId {
        debug_assert_eq!(bytes.len(), type_code.size());
        let offset = self.append_data(bytes);
        let mut arg = Argument::new("", type_code);
        arg.offset = offset;
        self.alloc_arg(arg)
    }

    pub fn i32_literal_arg(&mut self, value: i32) -> ArgId {
        self.data_literal_arg(TypeCode::I32, &value.to_le_bytes())
    }

    pub fn i64_literal_arg(&mut self, value: i64) -> ArgId {
        self.data_literal_arg(TypeCode::I64, &value.to_le_bytes())
    }

    pub fn f64_literal_arg(&mut self, value: f64) -> ArgId {
        self.data_literal_arg(TypeCode::F64, &value.to_le_bytes())
    }

    pub fn f32_literal_arg(&mut self, value: f32) -> ArgId {
        self.data_literal_arg(TypeCode::F32, &value.to_le_bytes())
    }

    pub fn bool_literal_arg(&mut self, value: bool) -> ArgId {
        self.data_literal_arg(TypeCode::Bool, &[value as u8])
    }

    /// Add a global: zeroed data-segment storage owned by `pkg`.
    pub fn add_global(&mut self, pkg: PkgId, mut arg: Argument) -> ArgId {
        arg.offset = self.reserve_data(arg.total_size);
        arg.pkg = Some(pkg);
        let id = self.alloc_arg(arg);
        self.package_mut(pkg).globals.push(id);
        id
    }

    /// Add a global i32 constant with an initial value (native-package
    /// status codes and mode bits).
    pub fn add_const_i32(&mut self, pkg: PkgId, name: &str, value: i32) -> ArgId {
        let id = self.add_global(pkg, Argument::new(name, TypeCode::I32));
        let offset = self.arg(id).offset;
        self.memory[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        id
    }

    // ------------------------------------------------------------------
    // Runtime bookkeeping

    /// Index of the currently executing frame.
    pub fn call_counter(&self) -> Option<usize> {
        self.call_stack.len().checked_sub(1)
    }
}
