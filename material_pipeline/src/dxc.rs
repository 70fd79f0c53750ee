//! Minimal in-process binding to the DXC shared library.
//!
//! Only the slice of the COM surface the pipeline needs is declared:
//! `DxcCreateInstance`, `IDxcCompiler3::Compile` and blob access on the
//! result. All returned buffers are copied into owned memory before the
//! COM objects are released.

use std::ffi::c_void;
use std::path::Path;

use libloading::Library;

use crate::compiler::{build_args, CompileOutput, CompileRequest};
use crate::PipelineError;

#[repr(C)]
#[derive(Clone, Copy)]
struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

const CLSID_DXC_COMPILER: Guid = Guid {
    data1: 0x73e2_2d93,
    data2: 0xe6ce,
    data3: 0x47f3,
    data4: [0xb5, 0xbf, 0xf0, 0x66, 0x4f, 0x39, 0xc1, 0xb0],
};

const IID_IDXC_COMPILER3: Guid = Guid {
    data1: 0x228b_4687,
    data2: 0x5a6a,
    data3: 0x4730,
    data4: [0x90, 0x0c, 0x97, 0x02, 0xb2, 0x20, 0x3f, 0x54],
};

const IID_IDXC_RESULT: Guid = Guid {
    data1: 0x5834_6cda,
    data2: 0xdde7,
    data3: 0x4497,
    data4: [0x94, 0x61, 0x6f, 0x87, 0xaf, 0x5e, 0x06, 0x59],
};

const IID_IDXC_BLOB: Guid = Guid {
    data1: 0x8ba5_fb08,
    data2: 0x5195,
    data3: 0x40e2,
    data4: [0xac, 0x58, 0x0d, 0x98, 0x9c, 0x3a, 0x01, 0x02],
};

const DXC_CP_UTF8: u32 = 65001;

const DXC_OUT_OBJECT: u32 = 1;
const DXC_OUT_ERRORS: u32 = 2;

type Hresult = i32;

#[repr(C)]
struct DxcBuffer {
    ptr: *const c_void,
    size: usize,
    encoding: u32,
}

#[repr(C)]
struct IUnknownVtbl {
    query_interface:
        unsafe extern "system" fn(*mut c_void, *const Guid, *mut *mut c_void) -> Hresult,
    add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    release: unsafe extern "system" fn(*mut c_void) -> u32,
}

#[repr(C)]
struct IDxcCompiler3Vtbl {
    base: IUnknownVtbl,
    compile: unsafe extern "system" fn(
        this: *mut c_void,
        source: *const DxcBuffer,
        arguments: *const *const u16,
        argument_count: u32,
        include_handler: *mut c_void,
        riid: *const Guid,
        result: *mut *mut c_void,
    ) -> Hresult,
    disassemble: unsafe extern "system" fn(
        this: *mut c_void,
        object: *const DxcBuffer,
        riid: *const Guid,
        result: *mut *mut c_void,
    ) -> Hresult,
}

#[repr(C)]
struct IDxcResultVtbl {
    base: IUnknownVtbl,
    // IDxcOperationResult
    get_status: unsafe extern "system" fn(*mut c_void, *mut Hresult) -> Hresult,
    get_result: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> Hresult,
    get_error_buffer: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> Hresult,
    // IDxcResult
    has_output: unsafe extern "system" fn(*mut c_void, u32) -> i32,
    get_output: unsafe extern "system" fn(
        this: *mut c_void,
        kind: u32,
        riid: *const Guid,
        object: *mut *mut c_void,
        output_name: *mut *mut c_void,
    ) -> Hresult,
}

#[repr(C)]
struct IDxcBlobVtbl {
    base: IUnknownVtbl,
    get_buffer_pointer: unsafe extern "system" fn(*mut c_void) -> *mut c_void,
    get_buffer_size: unsafe extern "system" fn(*mut c_void) -> usize,
}

/// An owned COM pointer whose vtable starts with IUnknown.
struct ComPtr {
    ptr: *mut c_void,
}

impl ComPtr {
    /// # Safety
    ///
    /// `ptr` must be a live COM object with an IUnknown-prefixed vtable,
    /// with one reference owned by the caller.
    unsafe fn new(ptr: *mut c_void) -> Self {
        Self { ptr }
    }

    fn vtbl<T>(&self) -> *const T {
        // The first pointer-sized field of any COM object is the vtable.
        unsafe { *(self.ptr as *const *const T) }
    }
}

impl Drop for ComPtr {
    fn drop(&mut self) {
        unsafe {
            let vtbl: *const IUnknownVtbl = self.vtbl();
            ((*vtbl).release)(self.ptr);
        }
    }
}

type DxcCreateInstanceFn =
    unsafe extern "system" fn(*const Guid, *const Guid, *mut *mut c_void) -> Hresult;

#[cfg(target_os = "windows")]
const LIBRARY_NAME: &str = "dxcompiler.dll";
#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libdxcompiler.dylib";
#[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
const LIBRARY_NAME: &str = "libdxcompiler.so";

pub(crate) struct DxcLibrary {
    compiler: ComPtr,
    // Dropped after the compiler: the vtables live in the library image.
    _library: Library,
}

// The instance is only driven behind `&mut self`; no state is shared
// between threads.
unsafe impl Send for DxcLibrary {}

impl DxcLibrary {
    pub fn open(path: Option<&Path>) -> Result<Self, PipelineError> {
        let name = path.map_or_else(
            || LIBRARY_NAME.to_owned(),
            |p| p.to_string_lossy().into_owned(),
        );

        let load_error = |reason: String| PipelineError::CompilerLoad {
            path: name.clone(),
            reason,
        };

        tracing::debug!("loading shader compiler library {name}");

        let library =
            unsafe { Library::new(&name) }.map_err(|err| load_error(err.to_string()))?;

        let create_instance = unsafe {
            library
                .get::<DxcCreateInstanceFn>(b"DxcCreateInstance\0")
                .map_err(|err| load_error(err.to_string()))?
        };

        let mut raw: *mut c_void = std::ptr::null_mut();
        let hr = unsafe { create_instance(&CLSID_DXC_COMPILER, &IID_IDXC_COMPILER3, &mut raw) };
        if hr < 0 || raw.is_null() {
            return Err(load_error(format!("DxcCreateInstance failed: {hr:#x}")));
        }

        Ok(Self {
            compiler: unsafe { ComPtr::new(raw) },
            _library: library,
        })
    }

    pub fn compile(&mut self, request: &CompileRequest<'_>) -> Result<CompileOutput, PipelineError> {
        let args = build_args(request);

        // The compile call wants UTF-16 argument strings.
        let wide: Vec<Vec<u16>> = args
            .iter()
            .map(|arg| arg.encode_utf16().chain([0]).collect())
            .collect();
        let pointers: Vec<*const u16> = wide.iter().map(|arg| arg.as_ptr()).collect();

        let buffer = DxcBuffer {
            ptr: request.source.as_ptr() as *const c_void,
            size: request.source.len(),
            encoding: DXC_CP_UTF8,
        };

        let result = unsafe {
            let vtbl: *const IDxcCompiler3Vtbl = self.compiler.vtbl();
            let mut raw: *mut c_void = std::ptr::null_mut();
            let hr = ((*vtbl).compile)(
                self.compiler.ptr,
                &buffer,
                pointers.as_ptr(),
                pointers.len() as u32,
                std::ptr::null_mut(),
                &IID_IDXC_RESULT,
                &mut raw,
            );
            if hr < 0 || raw.is_null() {
                return Err(PipelineError::CompilerInvocation(format!(
                    "IDxcCompiler3::Compile failed: {hr:#x}"
                )));
            }
            ComPtr::new(raw)
        };

        let status = unsafe {
            let vtbl: *const IDxcResultVtbl = result.vtbl();
            let mut status: Hresult = 0;
            let hr = ((*vtbl).get_status)(result.ptr, &mut status);
            if hr < 0 {
                return Err(PipelineError::CompilerInvocation(format!(
                    "IDxcResult::GetStatus failed: {hr:#x}"
                )));
            }
            status
        };

        let diagnostics = self
            .output_bytes(&result, DXC_OUT_ERRORS)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        if status < 0 {
            return Ok(CompileOutput {
                success: false,
                object: Vec::new(),
                diagnostics,
            });
        }

        let object = self.output_bytes(&result, DXC_OUT_OBJECT).ok_or_else(|| {
            PipelineError::CompilerInvocation("compile result has no object blob".to_owned())
        })?;

        Ok(CompileOutput {
            success: true,
            object,
            diagnostics,
        })
    }

    /// Copies one output blob of `result` into owned memory.
    fn output_bytes(&self, result: &ComPtr, kind: u32) -> Option<Vec<u8>> {
        unsafe {
            let vtbl: *const IDxcResultVtbl = result.vtbl();
            if ((*vtbl).has_output)(result.ptr, kind) == 0 {
                return None;
            }

            let mut raw: *mut c_void = std::ptr::null_mut();
            let hr = ((*vtbl).get_output)(
                result.ptr,
                kind,
                &IID_IDXC_BLOB,
                &mut raw,
                std::ptr::null_mut(),
            );
            if hr < 0 || raw.is_null() {
                return None;
            }

            let blob = ComPtr::new(raw);
            let blob_vtbl: *const IDxcBlobVtbl = blob.vtbl();
            let ptr = ((*blob_vtbl).get_buffer_pointer)(blob.ptr) as *const u8;
            let size = ((*blob_vtbl).get_buffer_size)(blob.ptr);

            if ptr.is_null() || size == 0 {
                return Some(Vec::new());
            }
            Some(std::slice::from_raw_parts(ptr, size).to_vec())
        }
    }
}

impl std::fmt::Debug for DxcLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DxcLibrary").finish_non_exhaustive()
    }
}
