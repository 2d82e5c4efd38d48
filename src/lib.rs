/*!
# Image Opening

A browser-based helper for marketplace catalog files: upload an Excel
masterfile, let it find the image URL columns, and download the same
workbook with a picture (or an `IMAGE()` formula) in every URL cell.

## Overview

Catalog operators preparing Walmart, Target/Mirakl, eBay or Amazon upload
files use it to eyeball product image links before submission. Broken
links and links that point at PDFs or HTML pages are annotated with a cell
note instead of a picture.

## Pipeline

1. **loader** reads the uploaded `.xlsx` into a [`workbook::Workbook`], keeping
   the whole document
2. **processor** picks the URL columns (by header name or auto-detection),
   optionally adds `*_preview` columns, resizes rows/columns and handles
   every URL cell in turn
3. **fetcher** looks up content types and downloads pictures
4. **embed** decodes and resizes each picture to PNG
5. **downloader** saves the edited document, so template formatting survives

## Embed modes

- `picture` - anchored picture on the cell, URL text kept underneath
- `formula` - `=IMAGE("url")`, fetched by Excel when the file is opened
- `auto` - picture, falling back to the formula when the download fails

## Modules

- **url**: URL detection and normalisation
- **geometry**: pixel to column-width/row-height conversion
- **marketplace**: template header rows per marketplace
- **workbook**: the loaded document and sheet operations
- **loader** / **downloader**: `.xlsx` input and output
- **fetcher**: HTTP access behind the [`fetcher::ImageSource`] trait
- **embed**: picture preparation
- **processor**: the pipeline itself
- **app**: axum routes (feature `web`)
- **config**: command line and environment settings (feature `web`)

## REST API Endpoints

- `GET /` - upload page
- `POST /api/inspect` - sheets, headers, detected columns and URL counts
- `POST /api/process` - the processed workbook as a download
*/

pub mod downloader;
pub mod embed;
pub mod error;
pub mod fetcher;
pub mod geometry;
pub mod loader;
pub mod marketplace;
pub mod processor;
pub mod url;
pub mod workbook;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use error::{PreviewError, Result};
