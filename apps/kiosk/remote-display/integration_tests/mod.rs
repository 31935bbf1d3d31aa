mod kiosk;
